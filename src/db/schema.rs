diesel::table! {
    games (id) {
        id -> Integer,
        uuid -> Text,
        white -> Text,
        black -> Text,
        position -> Text,
        move_count -> Integer,
        active -> Bool,
        draw_claimed -> Bool,
        version -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}
