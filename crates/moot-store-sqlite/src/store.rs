//! [`SqliteStore`] — the SQLite implementation of [`ForumStore`].
//!
//! Domain checks that must hold under concurrency (uniqueness, vote state,
//! accept state) run inside the same transaction as the write they guard.
//! Closures report domain failures through small outcome enums; mapping to
//! [`moot_core::Error`] happens outside, where the original identifiers are
//! still in scope.

use std::path::Path;

use chrono::Utc;
use moot_core::{
  Error, Result,
  comment::{Comment, NewComment},
  ledger::{
    AcceptTransition, RowAction, VoteAction, VoteKind, VoteTarget,
    accept_transition, vote_transition,
  },
  post::{NewPost, Post, PostSort, Tag},
  store::{
    AcceptReceipt, ForumStore, PostPage, PostQuery, ViewerContext, VoteReceipt,
  },
  user::{
    AccountField, GithubProfile, NewUser, ProfileUpdate, TopUsersSort, User,
    UserStats,
  },
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{
    RawComment, RawPost, RawTag, RawUser, bad_column, decode_uuid, encode_dt,
    encode_uuid, vote_kind_column,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Moot forum store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(Error::storage)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(Error::storage)?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }
}

// ─── Closure outcome types ───────────────────────────────────────────────────

enum ProfileOutcome {
  Done(Box<RawUser>),
  Missing,
  NameTaken,
}

enum TokenOutcome {
  Done(Box<RawUser>),
  Invalid,
}

enum CommentOutcome {
  Created { is_answer: bool },
  PostMissing,
  Locked,
  ParentMissing(Uuid),
}

struct RawVoteReceipt {
  action:              VoteAction,
  vote:                Option<VoteKind>,
  upvote_count:        i64,
  downvote_count:      i64,
  author_display_name: String,
  post_id:             String,
}

enum AcceptOutcome {
  Done(Box<RawAcceptReceipt>),
  PostMissing,
  NotAuthor,
  NotQuestion,
  CommentMissing,
}

struct RawAcceptReceipt {
  is_accepted:                  bool,
  accepted_answer_id:           Option<String>,
  comment_author_display_name:  String,
  previous_author_display_name: Option<String>,
}

// ─── ForumStore impl ─────────────────────────────────────────────────────────

impl ForumStore for SqliteStore {
  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = Utc::now();
    let user = User {
      user_id:         Uuid::new_v4(),
      email:           input.email,
      username:        input.username,
      display_name:    input.display_name,
      full_name:       input.full_name,
      bio:             None,
      avatar_url:      input.avatar_url,
      website_url:     None,
      location:        None,
      password_hash:   input.password_hash,
      github_id:       input.github_id,
      github_username: input.github_username,
      is_active:       true,
      is_verified:     input.is_verified,
      profile_public:  true,
      show_email:      false,
      show_real_name:  false,
      karma_score:     0,
      post_count:      0,
      comment_count:   0,
      created_at:      now,
      updated_at:      now,
    };

    let row = user.clone();
    let taken: Option<AccountField> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (field, column, value) in [
          (AccountField::Email, "email", &row.email),
          (AccountField::Username, "username", &row.username),
          (AccountField::DisplayName, "display_name", &row.display_name),
        ] {
          if column_taken(&tx, column, value, None)? {
            return Ok(Some(field));
          }
        }
        insert_user_row(&tx, &row)?;
        tx.commit()?;
        Ok(None)
      })
      .await
      .map_err(Error::storage)?;

    match taken {
      Some(field) => Err(Error::Conflict(format!(
        "{} is already taken",
        field.as_str()
      ))),
      None => Ok(user),
    }
  }

  async fn user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);
    let raw = self
      .conn
      .call(move |conn| Ok(user_row_where(conn, "user_id = ?1", &id_str)?))
      .await
      .map_err(Error::storage)?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn user_by_login(&self, login: &str) -> Result<Option<User>> {
    let login = login.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(user_row_where(conn, "email = ?1 OR username = ?1", &login)?)
      })
      .await
      .map_err(Error::storage)?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn user_by_display_name(&self, display_name: &str) -> Result<Option<User>> {
    let name = display_name.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(user_row_where(conn, "display_name = ?1", &name)?))
      .await
      .map_err(Error::storage)?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().map(|id| encode_uuid(*id)).collect();
    let raws = self
      .conn
      .call(move |conn| {
        let marks = vec!["?"; id_strs.len()].join(", ");
        let sql = format!(
          "SELECT {} FROM users WHERE user_id IN ({marks})",
          RawUser::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn account_field_taken(
    &self,
    field: AccountField,
    value: &str,
  ) -> Result<bool> {
    let value = value.to_owned();
    let column = match field {
      AccountField::Username => "username",
      AccountField::Email => "email",
      AccountField::DisplayName => "display_name",
    };
    self
      .conn
      .call(move |conn| Ok(column_taken(conn, column, &value, None)?))
      .await
      .map_err(Error::storage)
  }

  async fn update_profile(
    &self,
    user_id: Uuid,
    update: ProfileUpdate,
  ) -> Result<User> {
    let id_str = encode_uuid(user_id);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(current) = user_row_where(&tx, "user_id = ?1", &id_str)? else {
          return Ok(ProfileOutcome::Missing);
        };

        if let Some(name) = &update.display_name
          && !name.is_empty()
          && *name != current.display_name
          && column_taken(&tx, "display_name", name, Some(&id_str))?
        {
          return Ok(ProfileOutcome::NameTaken);
        }

        let display_name = update
          .display_name
          .filter(|n| !n.is_empty())
          .unwrap_or(current.display_name);
        let full_name = patch_text(update.full_name, current.full_name);
        let bio = patch_text(update.bio, current.bio);
        let avatar_url = patch_text(update.avatar_url, current.avatar_url);
        let website_url = patch_text(update.website_url, current.website_url);
        let location = patch_text(update.location, current.location);
        let profile_public =
          update.profile_public.unwrap_or(current.profile_public);
        let show_email = update.show_email.unwrap_or(current.show_email);
        let show_real_name =
          update.show_real_name.unwrap_or(current.show_real_name);

        tx.execute(
          "UPDATE users SET
             display_name = ?1, full_name = ?2, bio = ?3, avatar_url = ?4,
             website_url = ?5, location = ?6, profile_public = ?7,
             show_email = ?8, show_real_name = ?9, updated_at = ?10
           WHERE user_id = ?11",
          rusqlite::params![
            display_name,
            full_name,
            bio,
            avatar_url,
            website_url,
            location,
            profile_public,
            show_email,
            show_real_name,
            now_str,
            id_str,
          ],
        )?;

        let fresh = user_row_where(&tx, "user_id = ?1", &id_str)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(ProfileOutcome::Done(Box::new(fresh)))
      })
      .await
      .map_err(Error::storage)?;

    match outcome {
      ProfileOutcome::Done(raw) => raw.into_user(),
      ProfileOutcome::Missing => Err(Error::UserNotFound(user_id.to_string())),
      ProfileOutcome::NameTaken => {
        Err(Error::Conflict("display name is already taken".to_string()))
      }
    }
  }

  async fn search_users(
    &self,
    q: &str,
    limit: u32,
    offset: u32,
  ) -> Result<Vec<User>> {
    let pattern = format!("%{q}%");
    let limit = i64::from(limit);
    let offset = i64::from(offset);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM users
           WHERE is_active = 1 AND profile_public = 1
             AND (username LIKE ?1 OR display_name LIKE ?1 OR bio LIKE ?1)
           ORDER BY karma_score DESC, display_name ASC
           LIMIT ?2 OFFSET ?3",
          RawUser::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern, limit, offset], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn top_users(&self, sort: TopUsersSort, limit: u32) -> Result<Vec<User>> {
    let order = match sort {
      TopUsersSort::Karma => "karma_score",
      TopUsersSort::Posts => "post_count",
      TopUsersSort::Comments => "comment_count",
    };
    let limit = i64::from(limit);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM users
           WHERE is_active = 1 AND profile_public = 1
           ORDER BY {order} DESC, created_at ASC
           LIMIT ?1",
          RawUser::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn user_stats(&self) -> Result<UserStats> {
    let (total_users, verified_users) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*), COALESCE(SUM(is_verified), 0) FROM users
           WHERE is_active = 1",
          [],
          |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?)
      })
      .await
      .map_err(Error::storage)?;

    Ok(UserStats {
      total_users,
      verified_users,
    })
  }

  async fn github_signin(&self, profile: GithubProfile) -> Result<User> {
    let now_str = encode_dt(Utc::now());
    let minted_id = encode_uuid(Uuid::new_v4());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // already linked
        if let Some(existing) =
          user_row_where(&tx, "github_id = ?1", &profile.github_id)?
        {
          tx.execute(
            "UPDATE users SET github_username = ?1, updated_at = ?2
             WHERE user_id = ?3",
            rusqlite::params![profile.login, now_str, existing.user_id],
          )?;
          let fresh = user_row_where(&tx, "user_id = ?1", &existing.user_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
          tx.commit()?;
          return Ok(fresh);
        }

        // attach to the account holding the provider-verified email
        if let Some(email) = &profile.email
          && let Some(existing) = user_row_where(&tx, "email = ?1", email)?
        {
          tx.execute(
            "UPDATE users SET github_id = ?1, github_username = ?2,
               is_verified = 1, updated_at = ?3
             WHERE user_id = ?4",
            rusqlite::params![
              profile.github_id,
              profile.login,
              now_str,
              existing.user_id
            ],
          )?;
          let fresh = user_row_where(&tx, "user_id = ?1", &existing.user_id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
          tx.commit()?;
          return Ok(fresh);
        }

        // fresh account; provider accounts may hide their email address
        let email = profile.email.clone().unwrap_or_else(|| {
          format!("{}@users.noreply.github.com", profile.login)
        });
        let base = slug_base(&profile.login);
        let username = vacant_name(&tx, "username", &base)?;
        let display_name = vacant_name(&tx, "display_name", &profile.login)?;

        tx.execute(
          "INSERT INTO users (
             user_id, email, username, display_name, full_name, avatar_url,
             github_id, github_username, is_verified, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
          rusqlite::params![
            minted_id,
            email,
            username,
            display_name,
            profile.name,
            profile.avatar_url,
            profile.github_id,
            profile.login,
            now_str,
          ],
        )?;

        let fresh = user_row_where(&tx, "user_id = ?1", &minted_id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(fresh)
      })
      .await
      .map_err(Error::storage)?;

    raw.into_user()
  }

  // ── Email verification ────────────────────────────────────────────────────

  async fn create_verification_token(
    &self,
    user_id: Uuid,
    token_hash: &str,
    expires_at: chrono::DateTime<Utc>,
  ) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let hash = token_hash.to_owned();
    let expires_str = encode_dt(expires_at);
    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO email_verification_tokens
             (token_hash, user_id, expires_at, created_at, used_at)
           VALUES (?1, ?2, ?3, ?4, NULL)",
          rusqlite::params![hash, user_str, expires_str, now_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }

  async fn consume_verification_token(&self, token_hash: &str) -> Result<User> {
    let hash = token_hash.to_owned();
    let now = Utc::now();
    let now_str = encode_dt(now);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let row: Option<(String, String, Option<String>)> = tx
          .query_row(
            "SELECT user_id, expires_at, used_at
             FROM email_verification_tokens WHERE token_hash = ?1",
            rusqlite::params![hash],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        let Some((user_str, expires_str, used_at)) = row else {
          return Ok(TokenOutcome::Invalid);
        };
        if used_at.is_some() {
          return Ok(TokenOutcome::Invalid);
        }
        let expires = chrono::DateTime::parse_from_rfc3339(&expires_str)
          .map_err(|_| bad_column(1, "expires_at"))?;
        if expires.with_timezone(&Utc) <= now {
          return Ok(TokenOutcome::Invalid);
        }

        tx.execute(
          "UPDATE email_verification_tokens SET used_at = ?1
           WHERE token_hash = ?2",
          rusqlite::params![now_str, hash],
        )?;
        tx.execute(
          "UPDATE users SET is_verified = 1, updated_at = ?1 WHERE user_id = ?2",
          rusqlite::params![now_str, user_str],
        )?;

        let fresh = user_row_where(&tx, "user_id = ?1", &user_str)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(TokenOutcome::Done(Box::new(fresh)))
      })
      .await
      .map_err(Error::storage)?;

    match outcome {
      TokenOutcome::Done(raw) => raw.into_user(),
      TokenOutcome::Invalid => Err(Error::InvalidOperation(
        "verification token is invalid or expired".to_string(),
      )),
    }
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> Result<Post> {
    let now = Utc::now();
    let NewPost {
      post_id,
      author_id,
      title,
      slug,
      post_type,
      body_markdown,
      body_html,
      body_text,
      has_code,
      has_images,
      mut tags,
    } = input;
    tags.sort();
    tags.dedup();
    let post = Post {
      post_id,
      author_id,
      title,
      slug,
      post_type,
      body_markdown,
      body_html,
      body_text,
      has_code,
      has_images,
      tags: tags.clone(),
      upvote_count: 0,
      downvote_count: 0,
      comment_count: 0,
      answer_count: 0,
      view_count: 0,
      is_answered: false,
      accepted_answer_id: None,
      is_locked: false,
      is_deleted: false,
      is_featured: false,
      created_at: now,
      updated_at: now,
      last_activity: now,
    };

    let row = post.clone();
    let now_str = encode_dt(now);
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert_post_row(&tx, &row)?;

        let post_str = encode_uuid(row.post_id);
        for name in &tags {
          let tag_id: Option<String> = tx
            .query_row(
              "SELECT tag_id FROM tags WHERE name = ?1",
              rusqlite::params![name],
              |r| r.get(0),
            )
            .optional()?;
          let tag_id = match tag_id {
            Some(id) => id,
            None => {
              let id = encode_uuid(Uuid::new_v4());
              tx.execute(
                "INSERT INTO tags (tag_id, name, description, post_count, created_at)
                 VALUES (?1, ?2, NULL, 0, ?3)",
                rusqlite::params![id, name, now_str],
              )?;
              id
            }
          };
          let linked = tx.execute(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
            rusqlite::params![post_str, tag_id],
          )?;
          if linked > 0 {
            tx.execute(
              "UPDATE tags SET post_count = post_count + 1 WHERE tag_id = ?1",
              rusqlite::params![tag_id],
            )?;
          }
        }

        tx.execute(
          "UPDATE users SET post_count = post_count + 1, updated_at = ?1
           WHERE user_id = ?2",
          rusqlite::params![now_str, encode_uuid(row.author_id)],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::storage)?;

    Ok(post)
  }

  async fn post_by_id(&self, post_id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(post_id);
    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM posts WHERE post_id = ?1 AND is_deleted = 0",
                RawPost::COLUMNS
              ),
              rusqlite::params![id_str],
              RawPost::from_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(Error::storage)?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn list_posts(&self, query: &PostQuery) -> Result<PostPage> {
    let sort = query.sort;
    let type_str = query.post_type.map(|t| t.as_str());
    let tag = query.tag.clone();
    let author = query.author.clone();
    let pattern = query.search.as_deref().map(|s| format!("%{s}%"));
    let limit = i64::from(query.page_size);
    let offset = i64::from(query.page.max(1) - 1) * i64::from(query.page_size);

    let (raws, total): (Vec<RawPost>, i64) = self
      .conn
      .call(move |conn| {
        let mut where_sql = String::from(
          "WHERE is_deleted = 0
             AND (?1 IS NULL OR post_type = ?1)
             AND (?2 IS NULL OR EXISTS (
                   SELECT 1 FROM post_tags pt
                   JOIN tags t ON t.tag_id = pt.tag_id
                   WHERE pt.post_id = posts.post_id AND t.name = ?2))
             AND (?3 IS NULL OR author_id =
                   (SELECT user_id FROM users WHERE display_name = ?3))
             AND (?4 IS NULL OR title LIKE ?4 OR body_text LIKE ?4)",
        );
        if sort == PostSort::Unanswered {
          where_sql
            .push_str(" AND post_type = 'question' AND is_answered = 0");
        }
        let order = match sort {
          PostSort::Newest | PostSort::Unanswered => "ORDER BY created_at DESC",
          PostSort::Oldest => "ORDER BY created_at ASC",
          PostSort::MostVoted => {
            "ORDER BY (upvote_count - downvote_count) DESC, created_at DESC"
          }
          PostSort::MostViewed => "ORDER BY view_count DESC, created_at DESC",
          PostSort::MostAnswered => {
            "ORDER BY answer_count DESC, created_at DESC"
          }
          PostSort::Active => "ORDER BY last_activity DESC",
        };

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM posts {where_sql}"),
          rusqlite::params![type_str, tag, author, pattern],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM posts {where_sql} {order} LIMIT ?5 OFFSET ?6",
          RawPost::COLUMNS
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![type_str, tag, author, pattern, limit, offset],
            RawPost::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await
      .map_err(Error::storage)?;

    let posts = raws
      .into_iter()
      .map(RawPost::into_post)
      .collect::<Result<_>>()?;
    Ok(PostPage { posts, total })
  }

  async fn record_view(&self, post_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(post_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE posts SET view_count = view_count + 1
           WHERE post_id = ?1 AND is_deleted = 0",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await
      .map_err(Error::storage)
  }

  async fn list_tags(&self, search: Option<&str>, limit: u32) -> Result<Vec<Tag>> {
    let pattern = search.map(|s| format!("%{s}%"));
    let limit = i64::from(limit);

    let raws: Vec<RawTag> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM tags
           WHERE (?1 IS NULL OR name LIKE ?1)
           ORDER BY post_count DESC, name ASC
           LIMIT ?2",
          RawTag::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern, limit], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawTag::into_tag).collect()
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn create_comment(&self, input: NewComment) -> Result<Comment> {
    let now = Utc::now();
    let comment_id = Uuid::new_v4();
    let NewComment {
      post_id,
      author_id,
      parent_id,
      body_html,
      body_text,
      has_code,
      has_images,
    } = input;

    let post_str = encode_uuid(post_id);
    let author_str = encode_uuid(author_id);
    let comment_str = encode_uuid(comment_id);
    let parent_str = parent_id.map(encode_uuid);
    let now_str = encode_dt(now);
    let html = body_html.clone();
    let text = body_text.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let post: Option<(String, bool)> = tx
          .query_row(
            "SELECT post_type, is_locked FROM posts
             WHERE post_id = ?1 AND is_deleted = 0",
            rusqlite::params![post_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((post_type, is_locked)) = post else {
          return Ok(CommentOutcome::PostMissing);
        };
        if is_locked {
          return Ok(CommentOutcome::Locked);
        }

        if let Some(parent) = parent_id {
          let parent_str = encode_uuid(parent);
          let parent_post: Option<String> = tx
            .query_row(
              "SELECT post_id FROM comments
               WHERE comment_id = ?1 AND is_deleted = 0",
              rusqlite::params![parent_str],
              |r| r.get(0),
            )
            .optional()?;
          match parent_post {
            Some(p) if p == post_str => {}
            _ => return Ok(CommentOutcome::ParentMissing(parent)),
          }
          tx.execute(
            "UPDATE comments SET reply_count = reply_count + 1
             WHERE comment_id = ?1",
            rusqlite::params![parent_str],
          )?;
        }

        let is_answer = parent_id.is_none() && post_type == "question";
        tx.execute(
          "INSERT INTO comments (
             comment_id, post_id, author_id, parent_id, body_html, body_text,
             has_code, has_images, is_answer, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
          rusqlite::params![
            comment_str,
            post_str,
            author_str,
            parent_str,
            html,
            text,
            has_code,
            has_images,
            is_answer,
            now_str,
          ],
        )?;

        tx.execute(
          "UPDATE posts SET
             comment_count = comment_count + 1,
             answer_count = answer_count + ?1,
             last_activity = ?2
           WHERE post_id = ?3",
          rusqlite::params![i64::from(is_answer), now_str, post_str],
        )?;
        tx.execute(
          "UPDATE users SET comment_count = comment_count + 1, updated_at = ?1
           WHERE user_id = ?2",
          rusqlite::params![now_str, author_str],
        )?;

        tx.commit()?;
        Ok(CommentOutcome::Created { is_answer })
      })
      .await
      .map_err(Error::storage)?;

    match outcome {
      CommentOutcome::Created { is_answer } => Ok(Comment {
        comment_id,
        post_id,
        author_id,
        parent_id,
        body_html,
        body_text,
        has_code,
        has_images,
        upvote_count: 0,
        downvote_count: 0,
        reply_count: 0,
        is_answer,
        is_accepted: false,
        is_deleted: false,
        created_at: now,
        updated_at: now,
      }),
      CommentOutcome::PostMissing => Err(Error::PostNotFound(post_id)),
      CommentOutcome::Locked => {
        Err(Error::Forbidden("post is locked".to_string()))
      }
      CommentOutcome::ParentMissing(parent) => {
        Err(Error::CommentNotFound(parent))
      }
    }
  }

  async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
    let id_str = encode_uuid(post_id);
    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM comments
           WHERE post_id = ?1 AND is_deleted = 0
           ORDER BY created_at ASC",
          RawComment::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  async fn comments_by_user(
    &self,
    display_name: &str,
    limit: u32,
    offset: u32,
  ) -> Result<Vec<(Comment, String)>> {
    let name = display_name.to_owned();
    let limit = i64::from(limit);
    let offset = i64::from(offset);

    let raws: Vec<(RawComment, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {},
             (SELECT title FROM posts WHERE posts.post_id = comments.post_id)
               AS post_title
           FROM comments
           WHERE is_deleted = 0
             AND author_id = (SELECT user_id FROM users WHERE display_name = ?1)
             AND (SELECT is_deleted FROM posts
                  WHERE posts.post_id = comments.post_id) = 0
           ORDER BY created_at DESC
           LIMIT ?2 OFFSET ?3",
          RawComment::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![name, limit, offset], |row| {
            Ok((RawComment::from_row(row)?, row.get("post_title")?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws
      .into_iter()
      .map(|(raw, title)| Ok((raw.into_comment()?, title)))
      .collect()
  }

  // ── Ledger operations ─────────────────────────────────────────────────────

  async fn vote_on_post(
    &self,
    post_id: Uuid,
    user_id: Uuid,
    kind: VoteKind,
  ) -> Result<VoteReceipt> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);
    let now_str = encode_dt(Utc::now());

    let receipt = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let author: Option<String> = tx
          .query_row(
            "SELECT author_id FROM posts WHERE post_id = ?1 AND is_deleted = 0",
            rusqlite::params![post_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(author) = author else {
          return Ok(None);
        };

        let existing: Option<String> = tx
          .query_row(
            "SELECT vote_type FROM post_votes
             WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![post_str, user_str],
            |r| r.get(0),
          )
          .optional()?;
        let current = existing.as_deref().map(vote_kind_column).transpose()?;

        let o = vote_transition(VoteTarget::Post, current, kind);
        match o.row {
          RowAction::Insert => {
            tx.execute(
              "INSERT INTO post_votes
                 (post_id, user_id, vote_type, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?4)",
              rusqlite::params![post_str, user_str, kind.as_str(), now_str],
            )?;
          }
          RowAction::Delete => {
            tx.execute(
              "DELETE FROM post_votes WHERE post_id = ?1 AND user_id = ?2",
              rusqlite::params![post_str, user_str],
            )?;
          }
          RowAction::Update => {
            tx.execute(
              "UPDATE post_votes SET vote_type = ?3, updated_at = ?4
               WHERE post_id = ?1 AND user_id = ?2",
              rusqlite::params![post_str, user_str, kind.as_str(), now_str],
            )?;
          }
        }

        tx.execute(
          "UPDATE posts SET
             upvote_count = upvote_count + ?1,
             downvote_count = downvote_count + ?2
           WHERE post_id = ?3",
          rusqlite::params![o.upvote_delta, o.downvote_delta, post_str],
        )?;
        tx.execute(
          "UPDATE users SET karma_score = karma_score + ?1 WHERE user_id = ?2",
          rusqlite::params![o.karma_delta, author],
        )?;

        let (upvote_count, downvote_count): (i64, i64) = tx.query_row(
          "SELECT upvote_count, downvote_count FROM posts WHERE post_id = ?1",
          rusqlite::params![post_str],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let author_display_name: String = tx.query_row(
          "SELECT display_name FROM users WHERE user_id = ?1",
          rusqlite::params![author],
          |r| r.get(0),
        )?;

        tx.commit()?;
        Ok(Some(RawVoteReceipt {
          action: o.action,
          vote: o.vote,
          upvote_count,
          downvote_count,
          author_display_name,
          post_id: post_str,
        }))
      })
      .await
      .map_err(Error::storage)?
      .ok_or(Error::PostNotFound(post_id))?;

    Ok(VoteReceipt {
      action:              receipt.action,
      vote:                receipt.vote,
      upvote_count:        receipt.upvote_count,
      downvote_count:      receipt.downvote_count,
      author_display_name: receipt.author_display_name,
      post_id,
    })
  }

  async fn vote_on_comment(
    &self,
    comment_id: Uuid,
    user_id: Uuid,
    kind: VoteKind,
  ) -> Result<VoteReceipt> {
    let comment_str = encode_uuid(comment_id);
    let user_str = encode_uuid(user_id);
    let now_str = encode_dt(Utc::now());

    let receipt = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let target: Option<(String, String)> = tx
          .query_row(
            "SELECT post_id, author_id FROM comments
             WHERE comment_id = ?1 AND is_deleted = 0",
            rusqlite::params![comment_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;
        let Some((post_str, author)) = target else {
          return Ok(None);
        };

        let existing: Option<String> = tx
          .query_row(
            "SELECT vote_type FROM comment_votes
             WHERE comment_id = ?1 AND user_id = ?2",
            rusqlite::params![comment_str, user_str],
            |r| r.get(0),
          )
          .optional()?;
        let current = existing.as_deref().map(vote_kind_column).transpose()?;

        let o = vote_transition(VoteTarget::Comment, current, kind);
        match o.row {
          RowAction::Insert => {
            tx.execute(
              "INSERT INTO comment_votes
                 (comment_id, user_id, vote_type, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?4)",
              rusqlite::params![comment_str, user_str, kind.as_str(), now_str],
            )?;
          }
          RowAction::Delete => {
            tx.execute(
              "DELETE FROM comment_votes
               WHERE comment_id = ?1 AND user_id = ?2",
              rusqlite::params![comment_str, user_str],
            )?;
          }
          RowAction::Update => {
            tx.execute(
              "UPDATE comment_votes SET vote_type = ?3, updated_at = ?4
               WHERE comment_id = ?1 AND user_id = ?2",
              rusqlite::params![comment_str, user_str, kind.as_str(), now_str],
            )?;
          }
        }

        tx.execute(
          "UPDATE comments SET
             upvote_count = upvote_count + ?1,
             downvote_count = downvote_count + ?2
           WHERE comment_id = ?3",
          rusqlite::params![o.upvote_delta, o.downvote_delta, comment_str],
        )?;
        tx.execute(
          "UPDATE users SET karma_score = karma_score + ?1 WHERE user_id = ?2",
          rusqlite::params![o.karma_delta, author],
        )?;

        let (upvote_count, downvote_count): (i64, i64) = tx.query_row(
          "SELECT upvote_count, downvote_count FROM comments
           WHERE comment_id = ?1",
          rusqlite::params![comment_str],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let author_display_name: String = tx.query_row(
          "SELECT display_name FROM users WHERE user_id = ?1",
          rusqlite::params![author],
          |r| r.get(0),
        )?;

        tx.commit()?;
        Ok(Some(RawVoteReceipt {
          action: o.action,
          vote: o.vote,
          upvote_count,
          downvote_count,
          author_display_name,
          post_id: post_str,
        }))
      })
      .await
      .map_err(Error::storage)?
      .ok_or(Error::CommentNotFound(comment_id))?;

    Ok(VoteReceipt {
      action:              receipt.action,
      vote:                receipt.vote,
      upvote_count:        receipt.upvote_count,
      downvote_count:      receipt.downvote_count,
      author_display_name: receipt.author_display_name,
      post_id:             decode_uuid(&receipt.post_id)?,
    })
  }

  async fn accept_answer(
    &self,
    post_id: Uuid,
    comment_id: Uuid,
    acting_user: Uuid,
  ) -> Result<AcceptReceipt> {
    let post_str = encode_uuid(post_id);
    let comment_str = encode_uuid(comment_id);
    let acting_str = encode_uuid(acting_user);
    let now_str = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let post: Option<(String, String, Option<String>)> = tx
          .query_row(
            "SELECT author_id, post_type, accepted_answer_id FROM posts
             WHERE post_id = ?1 AND is_deleted = 0",
            rusqlite::params![post_str],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        let Some((post_author, post_type, accepted_str)) = post else {
          return Ok(AcceptOutcome::PostMissing);
        };
        if post_author != acting_str {
          return Ok(AcceptOutcome::NotAuthor);
        }
        if post_type != "question" {
          return Ok(AcceptOutcome::NotQuestion);
        }

        let comment_author: Option<String> = tx
          .query_row(
            "SELECT author_id FROM comments
             WHERE comment_id = ?1 AND post_id = ?2 AND is_deleted = 0",
            rusqlite::params![comment_str, post_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(comment_author) = comment_author else {
          return Ok(AcceptOutcome::CommentMissing);
        };

        let current = accepted_str
          .as_deref()
          .map(|s| {
            Uuid::parse_str(s)
              .map_err(|_| bad_column(2, "accepted_answer_id"))
          })
          .transpose()?;

        let receipt = match accept_transition(current, comment_id) {
          AcceptTransition::Accept => {
            tx.execute(
              "UPDATE comments SET is_accepted = 1, updated_at = ?1
               WHERE comment_id = ?2",
              rusqlite::params![now_str, comment_str],
            )?;
            tx.execute(
              "UPDATE posts SET accepted_answer_id = ?1, is_answered = 1,
                 updated_at = ?2
               WHERE post_id = ?3",
              rusqlite::params![comment_str, now_str, post_str],
            )?;
            shift_karma(&tx, &comment_author, ACCEPT_BONUS)?;
            RawAcceptReceipt {
              is_accepted:                  true,
              accepted_answer_id:           Some(comment_str.clone()),
              comment_author_display_name:  display_name_of(&tx, &comment_author)?,
              previous_author_display_name: None,
            }
          }
          AcceptTransition::Unaccept => {
            tx.execute(
              "UPDATE comments SET is_accepted = 0, updated_at = ?1
               WHERE comment_id = ?2",
              rusqlite::params![now_str, comment_str],
            )?;
            tx.execute(
              "UPDATE posts SET accepted_answer_id = NULL, is_answered = 0,
                 updated_at = ?1
               WHERE post_id = ?2",
              rusqlite::params![now_str, post_str],
            )?;
            shift_karma(&tx, &comment_author, -ACCEPT_BONUS)?;
            RawAcceptReceipt {
              is_accepted:                  false,
              accepted_answer_id:           None,
              comment_author_display_name:  display_name_of(&tx, &comment_author)?,
              previous_author_display_name: None,
            }
          }
          AcceptTransition::Transfer { previous } => {
            let previous_str = encode_uuid(previous);
            let previous_author: String = tx.query_row(
              "SELECT author_id FROM comments WHERE comment_id = ?1",
              rusqlite::params![previous_str],
              |r| r.get(0),
            )?;
            tx.execute(
              "UPDATE comments SET is_accepted = 0, updated_at = ?1
               WHERE comment_id = ?2",
              rusqlite::params![now_str, previous_str],
            )?;
            shift_karma(&tx, &previous_author, -ACCEPT_BONUS)?;
            tx.execute(
              "UPDATE comments SET is_accepted = 1, updated_at = ?1
               WHERE comment_id = ?2",
              rusqlite::params![now_str, comment_str],
            )?;
            tx.execute(
              "UPDATE posts SET accepted_answer_id = ?1, is_answered = 1,
                 updated_at = ?2
               WHERE post_id = ?3",
              rusqlite::params![comment_str, now_str, post_str],
            )?;
            shift_karma(&tx, &comment_author, ACCEPT_BONUS)?;
            RawAcceptReceipt {
              is_accepted:                  true,
              accepted_answer_id:           Some(comment_str.clone()),
              comment_author_display_name:  display_name_of(&tx, &comment_author)?,
              previous_author_display_name: Some(display_name_of(
                &tx,
                &previous_author,
              )?),
            }
          }
        };

        tx.commit()?;
        Ok(AcceptOutcome::Done(Box::new(receipt)))
      })
      .await
      .map_err(Error::storage)?;

    match outcome {
      AcceptOutcome::Done(raw) => Ok(AcceptReceipt {
        is_accepted:                  raw.is_accepted,
        accepted_answer_id:           raw
          .accepted_answer_id
          .as_deref()
          .map(decode_uuid)
          .transpose()?,
        comment_author_display_name:  raw.comment_author_display_name,
        previous_author_display_name: raw.previous_author_display_name,
      }),
      AcceptOutcome::PostMissing => Err(Error::PostNotFound(post_id)),
      AcceptOutcome::NotAuthor => Err(Error::Forbidden(
        "only the post author can accept answers".to_string(),
      )),
      AcceptOutcome::NotQuestion => Err(Error::InvalidOperation(
        "only questions can have accepted answers".to_string(),
      )),
      AcceptOutcome::CommentMissing => Err(Error::CommentNotFound(comment_id)),
    }
  }

  // ── Bookmarks & viewer state ──────────────────────────────────────────────

  async fn toggle_bookmark(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);
    let now_str = encode_dt(Utc::now());

    let bookmarked = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
          .query_row(
            "SELECT 1 FROM posts WHERE post_id = ?1 AND is_deleted = 0",
            rusqlite::params![post_str],
            |r| r.get(0),
          )
          .optional()?;
        if exists.is_none() {
          return Ok(None);
        }

        let held: Option<i64> = tx
          .query_row(
            "SELECT 1 FROM bookmarks WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![post_str, user_str],
            |r| r.get(0),
          )
          .optional()?;

        let bookmarked = if held.is_some() {
          tx.execute(
            "DELETE FROM bookmarks WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![post_str, user_str],
          )?;
          false
        } else {
          tx.execute(
            "INSERT INTO bookmarks (post_id, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![post_str, user_str, now_str],
          )?;
          true
        };

        tx.commit()?;
        Ok(Some(bookmarked))
      })
      .await
      .map_err(Error::storage)?;

    bookmarked.ok_or(Error::PostNotFound(post_id))
  }

  async fn bookmarked_posts(&self, user_id: Uuid) -> Result<Vec<Post>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM posts
           WHERE is_deleted = 0 AND post_id IN
             (SELECT post_id FROM bookmarks WHERE user_id = ?1)
           ORDER BY (SELECT created_at FROM bookmarks b
                     WHERE b.post_id = posts.post_id AND b.user_id = ?1) DESC",
          RawPost::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn viewer_context(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> Result<ViewerContext> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);

    let (user_vote, is_bookmarked) = self
      .conn
      .call(move |conn| {
        let vote: Option<String> = conn
          .query_row(
            "SELECT vote_type FROM post_votes
             WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![post_str, user_str],
            |r| r.get(0),
          )
          .optional()?;
        let user_vote = vote.as_deref().map(vote_kind_column).transpose()?;

        let bookmark: Option<i64> = conn
          .query_row(
            "SELECT 1 FROM bookmarks WHERE post_id = ?1 AND user_id = ?2",
            rusqlite::params![post_str, user_str],
            |r| r.get(0),
          )
          .optional()?;

        Ok((user_vote, bookmark.is_some()))
      })
      .await
      .map_err(Error::storage)?;

    Ok(ViewerContext {
      user_vote,
      is_bookmarked,
    })
  }

  async fn comment_votes(
    &self,
    post_id: Uuid,
    user_id: Uuid,
  ) -> Result<Vec<(Uuid, VoteKind)>> {
    let post_str = encode_uuid(post_id);
    let user_str = encode_uuid(user_id);

    let rows: Vec<(String, VoteKind)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT cv.comment_id, cv.vote_type
           FROM comment_votes cv
           JOIN comments c ON c.comment_id = cv.comment_id
           WHERE c.post_id = ?1 AND cv.user_id = ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![post_str, user_str], |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            Ok((id, vote_kind_column(&kind)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::storage)?;

    rows
      .into_iter()
      .map(|(id, kind)| Ok((decode_uuid(&id)?, kind)))
      .collect()
  }
}

const ACCEPT_BONUS: i64 = moot_core::ledger::ACCEPTED_ANSWER_KARMA;

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Fetch one user row by an equality condition on a single `?1` parameter.
fn user_row_where(
  conn: &rusqlite::Connection,
  cond: &str,
  param: &str,
) -> rusqlite::Result<Option<RawUser>> {
  conn
    .query_row(
      &format!("SELECT {} FROM users WHERE {cond}", RawUser::COLUMNS),
      rusqlite::params![param],
      RawUser::from_row,
    )
    .optional()
}

/// Whether `column = value` matches any user, optionally excluding one id.
fn column_taken(
  conn: &rusqlite::Connection,
  column: &str,
  value: &str,
  excluding: Option<&str>,
) -> rusqlite::Result<bool> {
  let hit: Option<i64> = conn
    .query_row(
      &format!(
        "SELECT 1 FROM users WHERE {column} = ?1 AND (?2 IS NULL OR user_id != ?2)"
      ),
      rusqlite::params![value, excluding],
      |r| r.get(0),
    )
    .optional()?;
  Ok(hit.is_some())
}

fn insert_user_row(conn: &rusqlite::Connection, user: &User) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO users (
       user_id, email, username, display_name, full_name, bio, avatar_url,
       website_url, location, password_hash, github_id, github_username,
       is_active, is_verified, profile_public, show_email, show_real_name,
       karma_score, post_count, comment_count, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
               ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
    rusqlite::params![
      encode_uuid(user.user_id),
      user.email,
      user.username,
      user.display_name,
      user.full_name,
      user.bio,
      user.avatar_url,
      user.website_url,
      user.location,
      user.password_hash,
      user.github_id,
      user.github_username,
      user.is_active,
      user.is_verified,
      user.profile_public,
      user.show_email,
      user.show_real_name,
      user.karma_score,
      user.post_count,
      user.comment_count,
      encode_dt(user.created_at),
      encode_dt(user.updated_at),
    ],
  )?;
  Ok(())
}

fn insert_post_row(conn: &rusqlite::Connection, post: &Post) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO posts (
       post_id, author_id, title, slug, post_type, body_markdown, body_html,
       body_text, has_code, has_images, upvote_count, downvote_count,
       comment_count, answer_count, view_count, is_answered,
       accepted_answer_id, is_locked, is_deleted, is_featured,
       created_at, updated_at, last_activity
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
               ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
    rusqlite::params![
      encode_uuid(post.post_id),
      encode_uuid(post.author_id),
      post.title,
      post.slug,
      post.post_type.as_str(),
      post.body_markdown,
      post.body_html,
      post.body_text,
      post.has_code,
      post.has_images,
      post.upvote_count,
      post.downvote_count,
      post.comment_count,
      post.answer_count,
      post.view_count,
      post.is_answered,
      post.accepted_answer_id.map(encode_uuid),
      post.is_locked,
      post.is_deleted,
      post.is_featured,
      encode_dt(post.created_at),
      encode_dt(post.updated_at),
      encode_dt(post.last_activity),
    ],
  )?;
  Ok(())
}

fn shift_karma(
  conn: &rusqlite::Connection,
  user_str: &str,
  delta: i64,
) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE users SET karma_score = karma_score + ?1 WHERE user_id = ?2",
    rusqlite::params![delta, user_str],
  )?;
  Ok(())
}

fn display_name_of(
  conn: &rusqlite::Connection,
  user_str: &str,
) -> rusqlite::Result<String> {
  conn.query_row(
    "SELECT display_name FROM users WHERE user_id = ?1",
    rusqlite::params![user_str],
    |r| r.get(0),
  )
}

/// Pick the first free value of `column`, suffixing `base` with a counter.
fn vacant_name(
  conn: &rusqlite::Connection,
  column: &str,
  base: &str,
) -> rusqlite::Result<String> {
  let mut candidate = base.to_string();
  let mut n = 1u32;
  loop {
    if !column_taken(conn, column, &candidate, None)? {
      return Ok(candidate);
    }
    candidate = format!("{base}-{n}");
    n += 1;
  }
}

/// Lowercased ASCII alphanumerics and hyphens for provider-derived usernames.
fn slug_base(login: &str) -> String {
  let cleaned: String = login
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
    .map(|c| c.to_ascii_lowercase())
    .collect();
  if cleaned.is_empty() {
    "github-user".to_string()
  } else {
    cleaned
  }
}

/// Apply one optional-text patch: `None` keeps the current value, an empty
/// string clears it.
fn patch_text(new: Option<String>, current: Option<String>) -> Option<String> {
  match new {
    None => current,
    Some(s) if s.is_empty() => None,
    Some(s) => Some(s),
  }
}
