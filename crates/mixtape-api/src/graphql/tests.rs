//! End-to-end resolver tests: real schema, in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use async_graphql::Request;
use serde_json::Value;
use uuid::Uuid;

use mixtape_db::Database;
use mixtape_db::models::NewFile;
use mixtape_types::api::Claims;

use super::{MixtapeSchema, build_schema};
use crate::auth::{self, AppState, AppStateInner};

const SECRET: &str = "test-secret";

fn setup() -> (AppState, MixtapeSchema) {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.into(),
        public_dir: PathBuf::from("public"),
    });
    (state.clone(), build_schema(state))
}

async fn exec(schema: &MixtapeSchema, identity: Option<&Claims>, query: &str) -> Value {
    let resp = exec_raw(schema, identity, query).await;
    assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);
    resp.data.into_json().unwrap()
}

async fn exec_raw(
    schema: &MixtapeSchema,
    identity: Option<&Claims>,
    query: &str,
) -> async_graphql::Response {
    let mut req = Request::new(query);
    if let Some(claims) = identity {
        req = req.data(claims.clone());
    }
    schema.execute(req).await
}

/// Register a user through the API and return the claims a verified token
/// for them would carry.
async fn register(schema: &MixtapeSchema, login: &str) -> Claims {
    let data = exec(
        schema,
        None,
        &format!(r#"mutation {{ register(login: "{login}", password: "p455w0rd") {{ id login }} }}"#),
    )
    .await;

    let id: Uuid = data["register"]["id"].as_str().unwrap().parse().unwrap();
    Claims {
        sub: id,
        login: login.to_string(),
        exp: usize::MAX,
    }
}

fn seed_file(state: &AppState, owner: &Claims, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    state
        .db
        .insert_file(&NewFile {
            id: &id,
            original_name: name,
            artist: None,
            mimetype: "audio/mpeg",
            filename: &id,
            path: &format!("public/uploads/{id}"),
            size: 1024,
            user_id: &owner.sub.to_string(),
        })
        .unwrap();
    id
}

fn member_ids(playlist: &Value) -> Vec<String> {
    let mut ids: Vec<String> = playlist["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn register_then_login_yields_a_verifiable_token() {
    let (_state, schema) = setup();
    let claims = register(&schema, "alice").await;

    let data = exec(
        &schema,
        None,
        r#"{ login(login: "alice", password: "p455w0rd") }"#,
    )
    .await;

    let token = data["login"].as_str().expect("token expected");
    let verified = auth::verify_token(SECRET, token).expect("token must verify");
    assert_eq!(verified.sub, claims.sub);
    assert_eq!(verified.login, "alice");
}

#[tokio::test]
async fn login_does_not_leak_which_credential_failed() {
    let (_state, schema) = setup();
    register(&schema, "alice").await;

    let wrong_password = exec(
        &schema,
        None,
        r#"{ login(login: "alice", password: "nope") }"#,
    )
    .await;
    let unknown_login = exec(
        &schema,
        None,
        r#"{ login(login: "nobody", password: "nope") }"#,
    )
    .await;

    assert!(wrong_password["login"].is_null());
    assert!(unknown_login["login"].is_null());
}

#[tokio::test]
async fn duplicate_login_is_an_explicit_error() {
    let (_state, schema) = setup();
    register(&schema, "alice").await;

    let resp = exec_raw(
        &schema,
        None,
        r#"mutation { register(login: "alice", password: "other") { id } }"#,
    )
    .await;
    assert!(!resp.errors.is_empty());
    assert!(resp.errors[0].message.contains("login already taken"));
}

#[tokio::test]
async fn list_queries_are_null_without_identity() {
    let (_state, schema) = setup();

    let data = exec(&schema, None, "{ getFiles { id } getPlaylists { id } }").await;
    assert!(data["getFiles"].is_null());
    assert!(data["getPlaylists"].is_null());
}

#[tokio::test]
async fn foreign_playlist_delete_is_a_rejected_noop() {
    let (_state, schema) = setup();
    let u1 = register(&schema, "a").await;
    let u2 = register(&schema, "b").await;

    let data = exec(
        &schema,
        Some(&u1),
        r#"mutation { addPlaylist(playlist: {title: "Mix"}) { id files { id } } }"#,
    )
    .await;
    let playlist_id = data["addPlaylist"]["id"].as_str().unwrap().to_string();
    assert!(data["addPlaylist"]["files"].as_array().unwrap().is_empty());

    let data = exec(
        &schema,
        Some(&u2),
        &format!(r#"mutation {{ deletePlaylist(id: "{playlist_id}") {{ id }} }}"#),
    )
    .await;
    assert!(data["deletePlaylist"].is_null());

    // Still there, still owned by u1
    let data = exec(&schema, Some(&u1), "{ getPlaylists { id userId } }").await;
    let playlists = data["getPlaylists"].as_array().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0]["id"].as_str().unwrap(), playlist_id);
    assert_eq!(
        playlists[0]["userId"].as_str().unwrap(),
        u1.sub.to_string()
    );
}

#[tokio::test]
async fn update_playlist_membership_is_a_full_replace() {
    let (state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let a = seed_file(&state, &u1, "a.mp3");
    let b = seed_file(&state, &u1, "b.mp3");
    let c = seed_file(&state, &u1, "c.mp3");

    let data = exec(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ addPlaylist(playlist: {{title: "Mix", fileIds: ["{a}", "{b}"]}}) {{ id }} }}"#
        ),
    )
    .await;
    let playlist_id = data["addPlaylist"]["id"].as_str().unwrap().to_string();

    let data = exec(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ updatePlaylist(id: "{playlist_id}", playlist: {{fileIds: ["{b}", "{c}"]}}) {{ files {{ id }} }} }}"#
        ),
    )
    .await;

    let mut expected = vec![b, c];
    expected.sort();
    assert_eq!(member_ids(&data["updatePlaylist"]), expected);
}

#[tokio::test]
async fn bulk_attach_rejects_the_whole_set() {
    let (state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let u2 = register(&schema, "bob").await;
    let mine = seed_file(&state, &u1, "mine.mp3");
    let theirs = seed_file(&state, &u2, "theirs.mp3");
    let phantom = Uuid::new_v4();

    // Foreign file in the set: explicit error, nothing created
    let resp = exec_raw(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ addPlaylist(playlist: {{title: "Mix", fileIds: ["{mine}", "{theirs}"]}}) {{ id }} }}"#
        ),
    )
    .await;
    assert!(!resp.errors.is_empty());

    // Unresolvable id in the set: same
    let resp = exec_raw(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ addPlaylist(playlist: {{title: "Mix", fileIds: ["{mine}", "{phantom}"]}}) {{ id }} }}"#
        ),
    )
    .await;
    assert!(!resp.errors.is_empty());

    let data = exec(&schema, Some(&u1), "{ getPlaylists { id } }").await;
    assert!(data["getPlaylists"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn set_avatar_updates_flag_and_reference_and_blocks_other_users() {
    let (state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let u2 = register(&schema, "bob").await;
    let f = seed_file(&state, &u1, "me.png");

    let data = exec(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ setAvatar(avatarId: "{f}") {{ avatar {{ id isAvatar }} }} }}"#
        ),
    )
    .await;
    assert_eq!(data["setAvatar"]["avatar"]["id"].as_str().unwrap(), f);
    assert!(data["setAvatar"]["avatar"]["isAvatar"].as_bool().unwrap());

    // Another user cannot claim the same file as their avatar
    let data = exec(
        &schema,
        Some(&u2),
        &format!(r#"mutation {{ setAvatar(avatarId: "{f}") {{ id }} }}"#),
    )
    .await;
    assert!(data["setAvatar"].is_null());

    let file = state.db.get_file(&f).unwrap().unwrap();
    assert_eq!(file.user_id, u1.sub.to_string());
}

#[tokio::test]
async fn users_may_only_rename_themselves() {
    let (_state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let u2 = register(&schema, "bob").await;

    let data = exec(
        &schema,
        Some(&u2),
        &format!(
            r#"mutation {{ updateUserNick(id: "{}", nick: "gotcha") {{ id }} }}"#,
            u1.sub
        ),
    )
    .await;
    assert!(data["updateUserNick"].is_null());

    let data = exec(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ updateUserNick(id: "{}", nick: "al") {{ nick }} }}"#,
            u1.sub
        ),
    )
    .await;
    assert_eq!(data["updateUserNick"]["nick"].as_str().unwrap(), "al");
}

#[tokio::test]
async fn add_tracks_to_library_reassigns_ownership_strictly() {
    let (state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let u2 = register(&schema, "bob").await;
    let f = seed_file(&state, &u2, "shared.mp3");

    let data = exec(
        &schema,
        Some(&u1),
        &format!(r#"mutation {{ addTracksToLibrary(fileIds: ["{f}"]) {{ id user {{ id }} }} }}"#),
    )
    .await;
    let files = data["addTracksToLibrary"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(
        files[0]["user"]["id"].as_str().unwrap(),
        u1.sub.to_string()
    );

    // A phantom id rejects the whole set
    let resp = exec_raw(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ addTracksToLibrary(fileIds: ["{f}", "{}"]) {{ id }} }}"#,
            Uuid::new_v4()
        ),
    )
    .await;
    assert!(!resp.errors.is_empty());
}

#[tokio::test]
async fn track_mutations_require_ownership() {
    let (state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let u2 = register(&schema, "bob").await;
    let f = seed_file(&state, &u1, "a.mp3");

    let data = exec(
        &schema,
        Some(&u2),
        &format!(r#"mutation {{ updateTrack(id: "{f}", artist: "Hijack") {{ id }} }}"#),
    )
    .await;
    assert!(data["updateTrack"].is_null());

    let data = exec(
        &schema,
        Some(&u2),
        &format!(r#"mutation {{ deleteTrack(id: "{f}") {{ id }} }}"#),
    )
    .await;
    assert!(data["deleteTrack"].is_null());

    // Row unchanged
    let file = state.db.get_file(&f).unwrap().unwrap();
    assert_eq!(file.user_id, u1.sub.to_string());
    assert!(file.artist.is_none());

    let data = exec(
        &schema,
        Some(&u1),
        &format!(r#"mutation {{ updateTrack(id: "{f}", artist: "Orbital") {{ artist }} }}"#),
    )
    .await;
    assert_eq!(data["updateTrack"]["artist"].as_str().unwrap(), "Orbital");
}

#[tokio::test]
async fn playlist_membership_add_and_remove_roundtrip() {
    let (state, schema) = setup();
    let u1 = register(&schema, "alice").await;
    let a = seed_file(&state, &u1, "a.mp3");
    let b = seed_file(&state, &u1, "b.mp3");

    let data = exec(
        &schema,
        Some(&u1),
        r#"mutation { addPlaylist(playlist: {title: "Mix"}) { id } }"#,
    )
    .await;
    let pid = data["addPlaylist"]["id"].as_str().unwrap().to_string();

    let data = exec(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ addTracksToPlaylist(playlistId: "{pid}", fileIds: ["{a}", "{b}"]) {{ files {{ id }} }} }}"#
        ),
    )
    .await;
    assert_eq!(member_ids(&data["addTracksToPlaylist"]).len(), 2);

    let data = exec(
        &schema,
        Some(&u1),
        &format!(
            r#"mutation {{ removeTrackFromPlaylist(playlistId: "{pid}", fileIds: ["{a}"]) {{ files {{ id }} }} }}"#
        ),
    )
    .await;
    assert_eq!(member_ids(&data["removeTrackFromPlaylist"]), vec![b]);
}
