use crate::Database;
use crate::models::{CommentRow, PostRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

const POST_COLUMNS: &str =
    "id, title, content, author, is_verified, category, fingerprint, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, post_id, author, content, created_at, updated_at";

impl Database {
    // -- Posts --

    pub fn insert_post(&self, post: &PostRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("INSERT INTO posts ({POST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                rusqlite::params![
                    post.id,
                    post.title,
                    post.content,
                    post.author,
                    post.is_verified,
                    post.category,
                    post.fingerprint,
                    post.created_at,
                    post.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first. `category` narrows to one tag.
    pub fn list_posts(&self, category: Option<&str>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| query_posts(conn, category))
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Overwrite the mutable columns. Returns false when no such post exists.
    pub fn update_post(&self, post: &PostRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE posts
                 SET title = ?2, content = ?3, author = ?4, is_verified = ?5,
                     category = ?6, updated_at = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    post.id,
                    post.title,
                    post.content,
                    post.author,
                    post.is_verified,
                    post.category,
                    post.updated_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Removes the post and, by cascade, its comments.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, comment: &CommentRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("INSERT INTO comments ({COMMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                rusqlite::params![
                    comment.id,
                    comment.post_id,
                    comment.author,
                    comment.content,
                    comment.created_at,
                    comment.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Comments on one post, newest first.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Scoped to the parent post so a comment id from another post is a miss.
    pub fn delete_comment(&self, post_id: &str, comment_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM comments WHERE id = ?1 AND post_id = ?2",
                [comment_id, post_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        is_verified: row.get(4)?,
        category: row.get(5)?,
        fingerprint: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn query_posts(conn: &Connection, category: Option<&str>) -> Result<Vec<PostRow>> {
    let rows = match category {
        Some(category) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE category = ?1 ORDER BY created_at DESC"
            ))?;
            stmt.query_map([category], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC"
            ))?;
            stmt.query_map([], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn query_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
    let row = stmt.query_row([id], post_from_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format_timestamp;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn post(title: &str, category: &str, age_minutes: i64) -> PostRow {
        let ts = format_timestamp(Utc::now() - Duration::minutes(age_minutes));
        PostRow {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: "body".to_string(),
            author: "Ana".to_string(),
            is_verified: false,
            category: category.to_string(),
            fingerprint: Some("r7quag".to_string()),
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    fn comment(post_id: &str, content: &str, age_minutes: i64) -> CommentRow {
        let ts = format_timestamp(Utc::now() - Duration::minutes(age_minutes));
        CommentRow {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            author: "Bia".to_string(),
            content: content.to_string(),
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    #[test]
    fn posts_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_post(&post("old", "public", 30)).unwrap();
        db.insert_post(&post("new", "public", 1)).unwrap();
        db.insert_post(&post("mid", "admin", 10)).unwrap();

        let titles: Vec<_> = db.list_posts(None).unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);

        let admin = db.list_posts(Some("admin")).unwrap();
        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].title, "mid");
    }

    #[test]
    fn get_and_update_post() {
        let db = Database::open_in_memory().unwrap();
        let mut p = post("draft", "public", 0);
        db.insert_post(&p).unwrap();

        let stored = db.get_post(&p.id).unwrap().unwrap();
        assert_eq!(stored, p);

        p.title = "final".to_string();
        p.is_verified = true;
        assert!(db.update_post(&p).unwrap());
        let stored = db.get_post(&p.id).unwrap().unwrap();
        assert_eq!(stored.title, "final");
        assert!(stored.is_verified);

        let ghost = post("ghost", "public", 0);
        assert!(!db.update_post(&ghost).unwrap());
        assert!(db.get_post(&ghost.id).unwrap().is_none());
    }

    #[test]
    fn unknown_category_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_post(&post("x", "moderator", 0)).is_err());
    }

    #[test]
    fn comments_belong_to_their_post() {
        let db = Database::open_in_memory().unwrap();
        let a = post("a", "public", 5);
        let b = post("b", "public", 5);
        db.insert_post(&a).unwrap();
        db.insert_post(&b).unwrap();

        let first = comment(&a.id, "first", 3);
        db.insert_comment(&first).unwrap();
        db.insert_comment(&comment(&a.id, "second", 1)).unwrap();

        let contents: Vec<_> = db
            .list_comments(&a.id)
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert!(db.list_comments(&b.id).unwrap().is_empty());

        assert!(!db.delete_comment(&b.id, &first.id).unwrap());
        assert!(db.delete_comment(&a.id, &first.id).unwrap());
        assert_eq!(db.list_comments(&a.id).unwrap().len(), 1);
    }

    #[test]
    fn comment_requires_existing_post() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_comment(&comment("missing", "orphan", 0)).is_err());
    }

    #[test]
    fn deleting_post_cascades_to_comments() {
        let db = Database::open_in_memory().unwrap();
        let p = post("doomed", "public", 0);
        db.insert_post(&p).unwrap();
        db.insert_comment(&comment(&p.id, "bye", 0)).unwrap();

        assert!(db.delete_post(&p.id).unwrap());
        assert!(!db.delete_post(&p.id).unwrap());
        assert!(db.list_comments(&p.id).unwrap().is_empty());
    }
}
