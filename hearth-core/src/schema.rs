use diesel::{table, allow_tables_to_appear_in_same_query};

table! {
    images (id) {
        id -> Text,
        user_id -> Text,
        household_id -> Text,
        file_name -> Nullable<Text>,
        created_at -> Nullable<Timestamptz>,
    }
}

table! {
    messages (id) {
        id -> Text,
        user_id -> Text,
        household_id -> Text,
        text -> Nullable<Text>,
        created_at -> Nullable<Timestamptz>,
    }
}

table! {
    household_members (household_id, user_id) {
        household_id -> Text,
        user_id -> Text,
    }
}

table! {
    devices (user_id, token) {
        user_id -> Text,
        token -> Text,
        platform -> Nullable<Text>,
        updated_at -> Timestamptz,
    }
}

table! {
    profiles (id) {
        id -> Text,
        display_name -> Nullable<Text>,
    }
}

allow_tables_to_appear_in_same_query!(
    images,
    messages,
    household_members,
    devices,
    profiles,
);
