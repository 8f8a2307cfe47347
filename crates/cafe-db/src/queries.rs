use crate::models::{CafeRow, CommentRow, NewCafeRow, SessionRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row, ffi};

const CAFE_COLUMNS: &str = "id, name, map_url, img_url, location, has_sockets, has_toilet, \
     has_wifi, can_take_calls, seats, coffee_price, author_id, date";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the email is already registered.
    pub fn create_user(&self, email: &str, name: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (email, password, name) VALUES (?1, ?2, ?3)",
                (email, password_hash, name),
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Id of the earliest registered user, the site administrator.
    pub fn first_user_id(&self) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let id = conn.query_row("SELECT MIN(id) FROM users", [], |row| row.get(0))?;
            Ok(id)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
    }

    // -- Sessions --

    /// `expires_at` is a UTC timestamp in SQLite's `YYYY-MM-DD HH:MM:SS` form.
    pub fn create_session(&self, id: &str, user_id: i64, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (id, user_id, expires_at),
            )?;
            Ok(())
        })
    }

    /// Fetch a session that has not yet expired.
    pub fn get_live_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, created_at, expires_at FROM sessions
                 WHERE id = ?1 AND expires_at > datetime('now')",
                [id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Returns whether a row was removed.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])? > 0))
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])?)
        })
    }

    // -- Cafes --

    /// Insert a cafe. Returns `None` when the name is already taken.
    pub fn insert_cafe(&self, cafe: &NewCafeRow<'_>) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO cafes (name, map_url, img_url, location, has_sockets, has_toilet,
                                    has_wifi, can_take_calls, seats, coffee_price, author_id, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    cafe.name,
                    cafe.map_url,
                    cafe.img_url,
                    cafe.location,
                    cafe.has_sockets,
                    cafe.has_toilet,
                    cafe.has_wifi,
                    cafe.can_take_calls,
                    cafe.seats,
                    cafe.coffee_price,
                    cafe.author_id,
                    cafe.date,
                ],
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_UNIQUE) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_cafe(&self, id: i64) -> Result<Option<CafeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CAFE_COLUMNS} FROM cafes WHERE id = ?1");
            conn.query_row(&sql, [id], cafe_from_row).optional()
        })
    }

    pub fn list_cafes(&self) -> Result<Vec<CafeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CAFE_COLUMNS} FROM cafes ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], cafe_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a cafe and, through the foreign key, its comments.
    /// Returns whether a row was removed.
    pub fn delete_cafe(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM cafes WHERE id = ?1", [id])? > 0))
    }

    // -- Comments --

    /// Insert a comment. Returns `None` when the post no longer exists.
    pub fn insert_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, author_id, text],
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(e) if is_constraint(&e, ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch author_name in a single query
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, u.name, c.text, c.created_at
                 FROM comments c
                 LEFT JOIN users u ON c.author_id = u.id
                 WHERE c.post_id = ?1
                 ORDER BY c.id",
            )?;

            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_name: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_comments(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?))
    }
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, filter: &str, value: P) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, email, password, name, created_at FROM users WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            name: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .optional()
}

fn cafe_from_row(row: &Row<'_>) -> rusqlite::Result<CafeRow> {
    Ok(CafeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        map_url: row.get(2)?,
        img_url: row.get(3)?,
        location: row.get(4)?,
        has_sockets: row.get(5)?,
        has_toilet: row.get(6)?,
        has_wifi: row.get(7)?,
        can_take_calls: row.get(8)?,
        seats: row.get(9)?,
        coffee_price: row.get(10)?,
        author_id: row.get(11)?,
        date: row.get(12)?,
    })
}

fn is_constraint(err: &rusqlite::Error, extended_code: std::ffi::c_int) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cafe<'a>(name: &'a str, author_id: Option<i64>) -> NewCafeRow<'a> {
        NewCafeRow {
            name,
            map_url: "https://maps.example.com/x",
            img_url: "https://img.example.com/x.jpg",
            location: "Town",
            has_sockets: true,
            has_toilet: false,
            has_wifi: true,
            can_take_calls: false,
            seats: "20-30",
            coffee_price: "2.50",
            author_id,
            date: "2026-10-18",
        }
    }

    #[test]
    fn duplicate_email_is_reported_without_a_new_row() {
        let db = Database::open_in_memory().unwrap();
        let first = db.create_user("a@x.com", "A", "hash").unwrap();
        assert_eq!(first, Some(1));

        assert_eq!(db.create_user("a@x.com", "B", "hash2").unwrap(), None);
        assert_eq!(db.count_users().unwrap(), 1);
        assert_eq!(db.get_user_by_email("a@x.com").unwrap().unwrap().name, "A");
    }

    #[test]
    fn first_user_is_lowest_id() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.first_user_id().unwrap(), None);

        let admin = db.create_user("admin@x.com", "Admin", "h").unwrap().unwrap();
        db.create_user("b@x.com", "B", "h").unwrap();
        assert_eq!(db.first_user_id().unwrap(), Some(admin));
    }

    #[test]
    fn cafe_roundtrip_and_unique_name() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_cafe(&cafe("Cafe X", None)).unwrap().unwrap();

        let row = db.get_cafe(id).unwrap().unwrap();
        assert_eq!(row.name, "Cafe X");
        assert!(row.has_sockets);
        assert!(!row.has_toilet);
        assert_eq!(row.coffee_price, "2.50");
        assert_eq!(row.author_id, None);

        assert_eq!(db.insert_cafe(&cafe("Cafe X", None)).unwrap(), None);
        assert_eq!(db.list_cafes().unwrap().len(), 1);
    }

    #[test]
    fn cafe_author_must_exist() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_cafe(&cafe("Ghost", Some(42))).is_err());
    }

    #[test]
    fn deleting_a_cafe_cascades_to_comments() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("a@x.com", "A", "h").unwrap().unwrap();
        let keep = db.insert_cafe(&cafe("Keep", Some(user))).unwrap().unwrap();
        let doomed = db.insert_cafe(&cafe("Doomed", Some(user))).unwrap().unwrap();
        db.insert_comment(keep, user, "nice").unwrap().unwrap();
        db.insert_comment(doomed, user, "gone soon").unwrap().unwrap();

        assert!(db.delete_cafe(doomed).unwrap());
        assert!(!db.delete_cafe(doomed).unwrap());
        assert_eq!(db.count_comments().unwrap(), 1);

        let comments = db.get_comments_for_post(keep).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author_name, "A");
    }

    #[test]
    fn comment_on_missing_post_is_none() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("a@x.com", "A", "h").unwrap().unwrap();
        assert_eq!(db.insert_comment(99, user, "hello?").unwrap(), None);
    }

    #[test]
    fn sessions_expire_and_delete_idempotently() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("a@x.com", "A", "h").unwrap().unwrap();
        db.create_session("live", user, "2999-01-01 00:00:00").unwrap();
        db.create_session("stale", user, "2000-01-01 00:00:00").unwrap();

        assert_eq!(db.get_live_session("live").unwrap().unwrap().user_id, user);
        assert!(db.get_live_session("stale").unwrap().is_none());

        assert_eq!(db.purge_expired_sessions().unwrap(), 1);
        assert!(db.delete_session("live").unwrap());
        assert!(!db.delete_session("live").unwrap());
    }
}
