//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use moot_core::{
  Error,
  comment::NewComment,
  ledger::{VoteAction, VoteKind},
  post::{NewPost, Post, PostSort, PostType},
  store::{ForumStore, PostQuery},
  user::{AccountField, GithubProfile, NewUser, ProfileUpdate, TopUsersSort, User},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn signup(handle: &str) -> NewUser {
  NewUser {
    email:           format!("{handle}@example.com"),
    username:        handle.into(),
    display_name:    format!("{handle}.dev"),
    password_hash:   Some("$argon2id$v=19$m=19456,t=2,p=1$c$h".into()),
    full_name:       None,
    avatar_url:      None,
    github_id:       None,
    github_username: None,
    is_verified:     false,
  }
}

async fn user(s: &SqliteStore, handle: &str) -> User {
  s.create_user(signup(handle)).await.unwrap()
}

fn draft(author: Uuid, title: &str, post_type: PostType, tags: &[&str]) -> NewPost {
  let post_id = Uuid::new_v4();
  NewPost {
    post_id,
    author_id: author,
    title: title.into(),
    slug: format!("t-{}", post_id.simple()),
    post_type,
    body_markdown: format!("Body of {title}."),
    body_html: format!("<p>Body of {title}.</p>"),
    body_text: format!("Body of {title}."),
    has_code: false,
    has_images: false,
    tags: tags.iter().map(|t| t.to_string()).collect(),
  }
}

async fn question(s: &SqliteStore, author: Uuid, title: &str) -> Post {
  s.create_post(draft(author, title, PostType::Question, &["rust"]))
    .await
    .unwrap()
}

fn reply(post: Uuid, author: Uuid, parent: Option<Uuid>) -> NewComment {
  NewComment {
    post_id:    post,
    author_id:  author,
    parent_id:  parent,
    body_html:  "<p>Try this.</p>".into(),
    body_text:  "Try this.".into(),
    has_code:   false,
    has_images: false,
  }
}

async fn karma(s: &SqliteStore, user_id: Uuid) -> i64 {
  s.user_by_id(user_id).await.unwrap().unwrap().karma_score
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_user_and_fetch() {
  let s = store().await;

  let alice = user(&s, "alice").await;
  assert_eq!(alice.email, "alice@example.com");
  assert!(alice.is_active);
  assert!(!alice.is_verified);
  assert_eq!(alice.karma_score, 0);

  let by_id = s.user_by_id(alice.user_id).await.unwrap().unwrap();
  assert_eq!(by_id.username, "alice");

  // login accepts either email or username
  let by_email = s.user_by_login("alice@example.com").await.unwrap().unwrap();
  let by_name = s.user_by_login("alice").await.unwrap().unwrap();
  assert_eq!(by_email.user_id, alice.user_id);
  assert_eq!(by_name.user_id, alice.user_id);

  let by_display = s.user_by_display_name("alice.dev").await.unwrap().unwrap();
  assert_eq!(by_display.user_id, alice.user_id);
}

#[tokio::test]
async fn create_user_conflict_names_the_field() {
  let s = store().await;
  user(&s, "alice").await;

  let mut dup_email = signup("someone");
  dup_email.email = "alice@example.com".into();
  let err = s.create_user(dup_email).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(ref m) if m.contains("email")));

  let mut dup_username = signup("other");
  dup_username.username = "alice".into();
  let err = s.create_user(dup_username).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(ref m) if m.contains("username")));

  let mut dup_display = signup("third");
  dup_display.display_name = "alice.dev".into();
  let err = s.create_user(dup_display).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(ref m) if m.contains("display name")));
}

#[tokio::test]
async fn account_field_probes() {
  let s = store().await;
  user(&s, "alice").await;

  assert!(
    s.account_field_taken(AccountField::Username, "alice")
      .await
      .unwrap()
  );
  assert!(
    !s.account_field_taken(AccountField::Username, "bob")
      .await
      .unwrap()
  );
  assert!(
    s.account_field_taken(AccountField::Email, "alice@example.com")
      .await
      .unwrap()
  );
  assert!(
    s.account_field_taken(AccountField::DisplayName, "alice.dev")
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn profile_patch_keeps_clears_and_sets() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let updated = s
    .update_profile(alice.user_id, ProfileUpdate {
      bio: Some("I write Rust.".into()),
      location: Some("Berlin".into()),
      show_email: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.bio.as_deref(), Some("I write Rust."));
  assert_eq!(updated.location.as_deref(), Some("Berlin"));
  assert!(updated.show_email);

  // None leaves a field alone, empty string clears it.
  let updated = s
    .update_profile(alice.user_id, ProfileUpdate {
      location: Some(String::new()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.bio.as_deref(), Some("I write Rust."));
  assert!(updated.location.is_none());
}

#[tokio::test]
async fn profile_patch_rejects_taken_display_name() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  user(&s, "bob").await;

  let err = s
    .update_profile(alice.user_id, ProfileUpdate {
      display_name: Some("bob.dev".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  // renaming to your own current name is not a conflict
  let same = s
    .update_profile(alice.user_id, ProfileUpdate {
      display_name: Some("alice.dev".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(same.display_name, "alice.dev");
}

#[tokio::test]
async fn profile_patch_unknown_user_errors() {
  let s = store().await;
  let err = s
    .update_profile(Uuid::new_v4(), ProfileUpdate::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn github_signin_matches_existing_link() {
  let s = store().await;

  let mut input = signup("carol");
  input.github_id = Some("7777".into());
  input.github_username = Some("carol-old".into());
  let carol = s.create_user(input).await.unwrap();

  let signed_in = s
    .github_signin(GithubProfile {
      github_id:  "7777".into(),
      login:      "carol-new".into(),
      name:       None,
      email:      None,
      avatar_url: None,
    })
    .await
    .unwrap();

  assert_eq!(signed_in.user_id, carol.user_id);
  assert_eq!(signed_in.github_username.as_deref(), Some("carol-new"));
}

#[tokio::test]
async fn github_signin_attaches_by_email() {
  let s = store().await;
  let carol = user(&s, "carol").await;
  assert!(!carol.is_verified);

  let signed_in = s
    .github_signin(GithubProfile {
      github_id:  "4242".into(),
      login:      "carolgh".into(),
      name:       None,
      email:      Some("carol@example.com".into()),
      avatar_url: None,
    })
    .await
    .unwrap();

  assert_eq!(signed_in.user_id, carol.user_id);
  assert_eq!(signed_in.github_id.as_deref(), Some("4242"));
  // the provider vouches for the address
  assert!(signed_in.is_verified);
}

#[tokio::test]
async fn github_signin_creates_with_suffixed_username() {
  let s = store().await;
  user(&s, "hubber").await;

  let signed_in = s
    .github_signin(GithubProfile {
      github_id:  "1".into(),
      login:      "hubber".into(),
      name:       Some("Hub Ber".into()),
      email:      None,
      avatar_url: Some("https://example.com/a.png".into()),
    })
    .await
    .unwrap();

  assert_eq!(signed_in.username, "hubber-1");
  assert_eq!(signed_in.email, "hubber@users.noreply.github.com");
  assert_eq!(signed_in.full_name.as_deref(), Some("Hub Ber"));
  assert!(signed_in.is_verified);
  assert!(signed_in.password_hash.is_none());
}

#[tokio::test]
async fn verification_token_single_use() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  s.create_verification_token(
    alice.user_id,
    "hash-abc",
    Utc::now() + Duration::minutes(30),
  )
  .await
  .unwrap();

  let verified = s.consume_verification_token("hash-abc").await.unwrap();
  assert_eq!(verified.user_id, alice.user_id);
  assert!(verified.is_verified);

  let err = s.consume_verification_token("hash-abc").await.unwrap_err();
  assert!(matches!(err, Error::InvalidOperation(_)));
}

#[tokio::test]
async fn verification_token_expired_or_unknown() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  s.create_verification_token(
    alice.user_id,
    "hash-old",
    Utc::now() - Duration::minutes(1),
  )
  .await
  .unwrap();

  let err = s.consume_verification_token("hash-old").await.unwrap_err();
  assert!(matches!(err, Error::InvalidOperation(_)));

  let err = s.consume_verification_token("hash-nope").await.unwrap_err();
  assert!(matches!(err, Error::InvalidOperation(_)));
}

#[tokio::test]
async fn user_search_and_stats() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  user(&s, "bob").await;

  let mut hidden = signup("mallory");
  hidden.is_verified = true;
  let mallory = s.create_user(hidden).await.unwrap();
  s.update_profile(mallory.user_id, ProfileUpdate {
    profile_public: Some(false),
    ..Default::default()
  })
  .await
  .unwrap();

  let hits = s.search_users("ali", 10, 0).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].user_id, alice.user_id);

  // private profiles stay out of search even on exact matches
  let hits = s.search_users("mallory", 10, 0).await.unwrap();
  assert!(hits.is_empty());

  let stats = s.user_stats().await.unwrap();
  assert_eq!(stats.total_users, 3);
  assert_eq!(stats.verified_users, 1);
}

#[tokio::test]
async fn users_by_ids_skips_unknown() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let batch = s
    .users_by_ids(&[alice.user_id, Uuid::new_v4(), bob.user_id])
    .await
    .unwrap();
  let mut names: Vec<_> = batch.into_iter().map(|u| u.username).collect();
  names.sort();
  assert_eq!(names, ["alice", "bob"]);

  assert!(s.users_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn top_users_orders_by_requested_metric() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  // bob writes, alice collects karma
  let post = question(&s, bob.user_id, "Borrowed values").await;
  s.vote_on_post(post.post_id, alice.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  let alice_post = question(&s, alice.user_id, "Lifetimes").await;
  s.vote_on_post(alice_post.post_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  s.vote_on_post(alice_post.post_id, alice.user_id, VoteKind::Upvote)
    .await
    .unwrap();

  let by_karma = s.top_users(TopUsersSort::Karma, 5).await.unwrap();
  assert_eq!(by_karma[0].user_id, alice.user_id);

  question(&s, bob.user_id, "Send bounds").await;
  let by_posts = s.top_users(TopUsersSort::Posts, 5).await.unwrap();
  assert_eq!(by_posts[0].user_id, bob.user_id);
  assert_eq!(by_posts[0].post_count, 2);
}

// ─── Posts & tags ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_post_bumps_tags_and_author() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let tagged = s
    .create_post(draft(
      alice.user_id,
      "Async traits",
      PostType::Question,
      &["rust", "async"],
    ))
    .await
    .unwrap();
  assert_eq!(tagged.tags, ["async", "rust"]);
  s.create_post(draft(
    alice.user_id,
    "Pinning",
    PostType::Discussion,
    &["rust"],
  ))
  .await
  .unwrap();

  let tags = s.list_tags(None, 10).await.unwrap();
  assert_eq!(tags.len(), 2);
  assert_eq!(tags[0].name, "rust");
  assert_eq!(tags[0].post_count, 2);
  assert_eq!(tags[1].name, "async");
  assert_eq!(tags[1].post_count, 1);

  let author = s.user_by_id(alice.user_id).await.unwrap().unwrap();
  assert_eq!(author.post_count, 2);

  let filtered = s.list_tags(Some("asy"), 10).await.unwrap();
  assert_eq!(filtered.len(), 1);
  assert_eq!(filtered[0].name, "async");
}

#[tokio::test]
async fn post_by_id_roundtrip() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let post = question(&s, alice.user_id, "Streams").await;

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert_eq!(fetched.title, "Streams");
  assert_eq!(fetched.post_type, PostType::Question);
  assert_eq!(fetched.slug, post.slug);
  assert_eq!(fetched.tags, ["rust"]);
  assert!(!fetched.is_answered);
  assert!(fetched.accepted_answer_id.is_none());

  assert!(s.post_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn record_view_increments() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let post = question(&s, alice.user_id, "Views").await;

  s.record_view(post.post_id).await.unwrap();
  s.record_view(post.post_id).await.unwrap();

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert_eq!(fetched.view_count, 2);
}

#[tokio::test]
async fn list_posts_filters() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  s.create_post(draft(
    alice.user_id,
    "Question about tokio",
    PostType::Question,
    &["tokio"],
  ))
  .await
  .unwrap();
  s.create_post(draft(
    bob.user_id,
    "Discussion about axum",
    PostType::Discussion,
    &["axum"],
  ))
  .await
  .unwrap();
  s.create_post(draft(
    bob.user_id,
    "Another tokio question",
    PostType::Question,
    &["tokio"],
  ))
  .await
  .unwrap();

  let questions = s
    .list_posts(&PostQuery {
      post_type: Some(PostType::Question),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(questions.total, 2);
  assert!(
    questions
      .posts
      .iter()
      .all(|p| p.post_type == PostType::Question)
  );

  let tagged = s
    .list_posts(&PostQuery {
      tag: Some("axum".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(tagged.total, 1);
  assert_eq!(tagged.posts[0].title, "Discussion about axum");

  let by_author = s
    .list_posts(&PostQuery {
      author: Some("bob.dev".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_author.total, 2);

  let searched = s
    .list_posts(&PostQuery {
      search: Some("axum".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(searched.total, 1);

  let nobody = s
    .list_posts(&PostQuery {
      author: Some("nobody".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(nobody.total, 0);
  assert!(nobody.posts.is_empty());
}

#[tokio::test]
async fn list_posts_paginates_with_total() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  for i in 0..5 {
    question(&s, alice.user_id, &format!("Question {i}")).await;
  }

  let page1 = s
    .list_posts(&PostQuery {
      page: 1,
      page_size: 2,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page1.total, 5);
  assert_eq!(page1.posts.len(), 2);

  let page3 = s
    .list_posts(&PostQuery {
      page: 3,
      page_size: 2,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page3.total, 5);
  assert_eq!(page3.posts.len(), 1);

  // newest-first: page 1 starts at the most recent title
  assert_eq!(page1.posts[0].title, "Question 4");
  assert_eq!(page3.posts[0].title, "Question 0");
}

#[tokio::test]
async fn list_posts_sorts() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let plain = question(&s, alice.user_id, "Plain").await;
  let popular = question(&s, alice.user_id, "Popular").await;
  s.vote_on_post(popular.post_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();

  let by_votes = s
    .list_posts(&PostQuery {
      sort: PostSort::MostVoted,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_votes.posts[0].post_id, popular.post_id);

  // a comment bumps last_activity, which drives the active sort
  s.create_comment(reply(plain.post_id, bob.user_id, None))
    .await
    .unwrap();
  let by_activity = s
    .list_posts(&PostQuery {
      sort: PostSort::Active,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(by_activity.posts[0].post_id, plain.post_id);
}

#[tokio::test]
async fn unanswered_sort_excludes_accepted_questions() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;

  let answered = question(&s, alice.user_id, "Answered").await;
  let open = question(&s, alice.user_id, "Open").await;
  s.create_post(draft(
    alice.user_id,
    "Chatter",
    PostType::Discussion,
    &[],
  ))
  .await
  .unwrap();

  let answer = s
    .create_comment(reply(answered.post_id, bob.user_id, None))
    .await
    .unwrap();
  s.accept_answer(answered.post_id, answer.comment_id, alice.user_id)
    .await
    .unwrap();

  let unanswered = s
    .list_posts(&PostQuery {
      sort: PostSort::Unanswered,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(unanswered.total, 1);
  assert_eq!(unanswered.posts[0].post_id, open.post_id);
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comment_side_effects_on_question() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Counters").await;

  let answer = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();
  assert!(answer.is_answer);
  assert!(!answer.is_accepted);

  let nested = s
    .create_comment(reply(post.post_id, alice.user_id, Some(answer.comment_id)))
    .await
    .unwrap();
  assert!(!nested.is_answer);

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert_eq!(fetched.comment_count, 2);
  assert_eq!(fetched.answer_count, 1);
  assert!(fetched.last_activity >= fetched.created_at);

  let thread = s.comments_for_post(post.post_id).await.unwrap();
  assert_eq!(thread.len(), 2);
  // oldest first
  assert_eq!(thread[0].comment_id, answer.comment_id);
  assert_eq!(thread[0].reply_count, 1);
  assert_eq!(thread[1].parent_id, Some(answer.comment_id));

  let bob_fresh = s.user_by_id(bob.user_id).await.unwrap().unwrap();
  assert_eq!(bob_fresh.comment_count, 1);
}

#[tokio::test]
async fn top_level_comment_on_discussion_is_not_an_answer() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let post = s
    .create_post(draft(alice.user_id, "Chat", PostType::Discussion, &[]))
    .await
    .unwrap();

  let comment = s
    .create_comment(reply(post.post_id, alice.user_id, None))
    .await
    .unwrap();
  assert!(!comment.is_answer);

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert_eq!(fetched.comment_count, 1);
  assert_eq!(fetched.answer_count, 0);
}

#[tokio::test]
async fn comment_rejects_bad_targets() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let post = question(&s, alice.user_id, "Targets").await;
  let other = question(&s, alice.user_id, "Elsewhere").await;

  let err = s
    .create_comment(reply(Uuid::new_v4(), alice.user_id, None))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PostNotFound(_)));

  let err = s
    .create_comment(reply(post.post_id, alice.user_id, Some(Uuid::new_v4())))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CommentNotFound(_)));

  // a parent on a different post is not a valid parent
  let stray = s
    .create_comment(reply(other.post_id, alice.user_id, None))
    .await
    .unwrap();
  let err = s
    .create_comment(reply(post.post_id, alice.user_id, Some(stray.comment_id)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CommentNotFound(_)));
}

#[tokio::test]
async fn comments_by_user_newest_first() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "History").await;

  let first = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();
  let second = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();

  let recent = s.comments_by_user("bob.dev", 10, 0).await.unwrap();
  assert_eq!(recent.len(), 2);
  assert_eq!(recent[0].0.comment_id, second.comment_id);
  assert_eq!(recent[1].0.comment_id, first.comment_id);
  assert_eq!(recent[0].1, "History");

  let limited = s.comments_by_user("bob.dev", 1, 1).await.unwrap();
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].0.comment_id, first.comment_id);

  assert!(s.comments_by_user("ghost", 10, 0).await.unwrap().is_empty());
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn post_vote_lifecycle() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Votes").await;

  // fresh upvote
  let r = s
    .vote_on_post(post.post_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  assert_eq!(r.action, VoteAction::Created);
  assert_eq!(r.vote, Some(VoteKind::Upvote));
  assert_eq!((r.upvote_count, r.downvote_count), (1, 0));
  assert_eq!(r.author_display_name, "alice.dev");
  assert_eq!(karma(&s, alice.user_id).await, 10);

  // same vote again toggles off
  let r = s
    .vote_on_post(post.post_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  assert_eq!(r.action, VoteAction::Removed);
  assert_eq!(r.vote, None);
  assert_eq!((r.upvote_count, r.downvote_count), (0, 0));
  assert_eq!(karma(&s, alice.user_id).await, 0);

  // down, then switch to up in one step
  s.vote_on_post(post.post_id, bob.user_id, VoteKind::Downvote)
    .await
    .unwrap();
  assert_eq!(karma(&s, alice.user_id).await, -2);
  let r = s
    .vote_on_post(post.post_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  assert_eq!(r.action, VoteAction::Updated);
  assert_eq!((r.upvote_count, r.downvote_count), (1, 0));
  assert_eq!(karma(&s, alice.user_id).await, 10);

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert_eq!(fetched.upvote_count, 1);
  assert_eq!(fetched.downvote_count, 0);
}

#[tokio::test]
async fn comment_vote_weights() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Weights").await;
  let comment = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();

  let r = s
    .vote_on_comment(comment.comment_id, alice.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  assert_eq!((r.upvote_count, r.downvote_count), (1, 0));
  assert_eq!(r.post_id, post.post_id);
  assert_eq!(karma(&s, bob.user_id).await, 5);

  s.vote_on_comment(comment.comment_id, alice.user_id, VoteKind::Downvote)
    .await
    .unwrap();
  assert_eq!(karma(&s, bob.user_id).await, -1);

  let thread = s.comments_for_post(post.post_id).await.unwrap();
  assert_eq!(thread[0].upvote_count, 0);
  assert_eq!(thread[0].downvote_count, 1);
}

#[tokio::test]
async fn voting_on_missing_targets_errors() {
  let s = store().await;
  let alice = user(&s, "alice").await;

  let err = s
    .vote_on_post(Uuid::new_v4(), alice.user_id, VoteKind::Upvote)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PostNotFound(_)));

  let err = s
    .vote_on_comment(Uuid::new_v4(), alice.user_id, VoteKind::Upvote)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CommentNotFound(_)));
}

// ─── Accepted answers ────────────────────────────────────────────────────────

#[tokio::test]
async fn accept_unaccept_cycle() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Accept me").await;
  let answer = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();

  let r = s
    .accept_answer(post.post_id, answer.comment_id, alice.user_id)
    .await
    .unwrap();
  assert!(r.is_accepted);
  assert_eq!(r.accepted_answer_id, Some(answer.comment_id));
  assert_eq!(r.comment_author_display_name, "bob.dev");
  assert!(r.previous_author_display_name.is_none());
  assert_eq!(karma(&s, bob.user_id).await, 15);

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert!(fetched.is_answered);
  assert_eq!(fetched.accepted_answer_id, Some(answer.comment_id));
  let thread = s.comments_for_post(post.post_id).await.unwrap();
  assert!(thread[0].is_accepted);

  // accepting the same comment again unaccepts it
  let r = s
    .accept_answer(post.post_id, answer.comment_id, alice.user_id)
    .await
    .unwrap();
  assert!(!r.is_accepted);
  assert!(r.accepted_answer_id.is_none());
  assert_eq!(karma(&s, bob.user_id).await, 0);

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert!(!fetched.is_answered);
  assert!(fetched.accepted_answer_id.is_none());
}

#[tokio::test]
async fn accept_transfer_moves_flag_and_karma() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let carol = user(&s, "carol").await;
  let post = question(&s, alice.user_id, "Transfer").await;

  let from_bob = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();
  let from_carol = s
    .create_comment(reply(post.post_id, carol.user_id, None))
    .await
    .unwrap();

  s.accept_answer(post.post_id, from_bob.comment_id, alice.user_id)
    .await
    .unwrap();
  let r = s
    .accept_answer(post.post_id, from_carol.comment_id, alice.user_id)
    .await
    .unwrap();

  assert!(r.is_accepted);
  assert_eq!(r.accepted_answer_id, Some(from_carol.comment_id));
  assert_eq!(r.comment_author_display_name, "carol.dev");
  assert_eq!(r.previous_author_display_name.as_deref(), Some("bob.dev"));
  assert_eq!(karma(&s, bob.user_id).await, 0);
  assert_eq!(karma(&s, carol.user_id).await, 15);

  let fetched = s.post_by_id(post.post_id).await.unwrap().unwrap();
  assert!(fetched.is_answered);
  assert_eq!(fetched.accepted_answer_id, Some(from_carol.comment_id));

  let thread = s.comments_for_post(post.post_id).await.unwrap();
  let bob_comment = thread
    .iter()
    .find(|c| c.comment_id == from_bob.comment_id)
    .unwrap();
  assert!(!bob_comment.is_accepted);
}

#[tokio::test]
async fn accept_permission_and_type_checks() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Rules").await;
  let answer = s
    .create_comment(reply(post.post_id, bob.user_id, None))
    .await
    .unwrap();

  // only the post author may accept
  let err = s
    .accept_answer(post.post_id, answer.comment_id, bob.user_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  // only questions carry accepted answers
  let chat = s
    .create_post(draft(alice.user_id, "Chat", PostType::Discussion, &[]))
    .await
    .unwrap();
  let comment = s
    .create_comment(reply(chat.post_id, bob.user_id, None))
    .await
    .unwrap();
  let err = s
    .accept_answer(chat.post_id, comment.comment_id, alice.user_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidOperation(_)));

  // the comment must live on the post
  let err = s
    .accept_answer(post.post_id, comment.comment_id, alice.user_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CommentNotFound(_)));
}

// ─── Bookmarks & viewer state ────────────────────────────────────────────────

#[tokio::test]
async fn bookmark_toggle_and_listing() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let first = question(&s, alice.user_id, "First").await;
  let second = question(&s, alice.user_id, "Second").await;

  assert!(s.toggle_bookmark(first.post_id, alice.user_id).await.unwrap());
  assert!(s.toggle_bookmark(second.post_id, alice.user_id).await.unwrap());

  // most recently bookmarked first
  let saved = s.bookmarked_posts(alice.user_id).await.unwrap();
  assert_eq!(saved.len(), 2);
  assert_eq!(saved[0].post_id, second.post_id);
  assert_eq!(saved[1].post_id, first.post_id);

  assert!(!s.toggle_bookmark(first.post_id, alice.user_id).await.unwrap());
  let saved = s.bookmarked_posts(alice.user_id).await.unwrap();
  assert_eq!(saved.len(), 1);
  assert_eq!(saved[0].post_id, second.post_id);

  let err = s
    .toggle_bookmark(Uuid::new_v4(), alice.user_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PostNotFound(_)));
}

#[tokio::test]
async fn viewer_context_reflects_vote_and_bookmark() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Context").await;

  let ctx = s.viewer_context(post.post_id, bob.user_id).await.unwrap();
  assert!(ctx.user_vote.is_none());
  assert!(!ctx.is_bookmarked);

  s.vote_on_post(post.post_id, bob.user_id, VoteKind::Downvote)
    .await
    .unwrap();
  s.toggle_bookmark(post.post_id, bob.user_id).await.unwrap();

  let ctx = s.viewer_context(post.post_id, bob.user_id).await.unwrap();
  assert_eq!(ctx.user_vote, Some(VoteKind::Downvote));
  assert!(ctx.is_bookmarked);

  // someone else's context is untouched
  let ctx = s.viewer_context(post.post_id, alice.user_id).await.unwrap();
  assert!(ctx.user_vote.is_none());
  assert!(!ctx.is_bookmarked);
}

#[tokio::test]
async fn comment_votes_scoped_to_post() {
  let s = store().await;
  let alice = user(&s, "alice").await;
  let bob = user(&s, "bob").await;
  let post = question(&s, alice.user_id, "Scoped").await;
  let other = question(&s, alice.user_id, "Other").await;

  let c1 = s
    .create_comment(reply(post.post_id, alice.user_id, None))
    .await
    .unwrap();
  let c2 = s
    .create_comment(reply(post.post_id, alice.user_id, None))
    .await
    .unwrap();
  let elsewhere = s
    .create_comment(reply(other.post_id, alice.user_id, None))
    .await
    .unwrap();

  s.vote_on_comment(c1.comment_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();
  s.vote_on_comment(c2.comment_id, bob.user_id, VoteKind::Downvote)
    .await
    .unwrap();
  s.vote_on_comment(elsewhere.comment_id, bob.user_id, VoteKind::Upvote)
    .await
    .unwrap();

  let mut votes = s.comment_votes(post.post_id, bob.user_id).await.unwrap();
  votes.sort_by_key(|(id, _)| *id);
  let mut expected = vec![
    (c1.comment_id, VoteKind::Upvote),
    (c2.comment_id, VoteKind::Downvote),
  ];
  expected.sort_by_key(|(id, _)| *id);
  assert_eq!(votes, expected);
}
