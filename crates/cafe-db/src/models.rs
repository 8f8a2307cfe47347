/// Database row types. These map directly to SQLite rows.
/// Distinct from cafe-types models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub name: String,
    pub created_at: String,
}

pub struct CafeRow {
    pub id: i64,
    pub name: String,
    pub map_url: String,
    pub img_url: String,
    pub location: String,
    pub has_sockets: bool,
    pub has_toilet: bool,
    pub has_wifi: bool,
    pub can_take_calls: bool,
    pub seats: String,
    pub coffee_price: String,
    pub author_id: Option<i64>,
    pub date: String,
}

/// Column values for a new cafe row; `id` is assigned by SQLite.
pub struct NewCafeRow<'a> {
    pub name: &'a str,
    pub map_url: &'a str,
    pub img_url: &'a str,
    pub location: &'a str,
    pub has_sockets: bool,
    pub has_toilet: bool,
    pub has_wifi: bool,
    pub can_take_calls: bool,
    pub seats: &'a str,
    pub coffee_price: &'a str,
    pub author_id: Option<i64>,
    pub date: &'a str,
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: i64,
    pub created_at: String,
    pub expires_at: String,
}
