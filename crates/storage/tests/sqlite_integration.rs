use quiz_core::model::{
    QuestionBank, QuizSession, RawAnswer, SessionKey, SessionState, summarize,
};
use quiz_core::time::fixed_now;
use storage::repository::{QuizSessionRepository, ReportRepository, Storage, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_round_trips_session_snapshot() {
    let repo = connect("memdb_sessions").await;
    let bank = QuestionBank::embedded().unwrap();
    let key = SessionKey::generate();

    let mut session = QuizSession::new(&bank);
    session.start(fixed_now()).unwrap();
    session.submit_answer(RawAnswer::choice(1)).unwrap();
    session.advance(fixed_now()).unwrap();
    session.submit_answer(RawAnswer::text(" GomburzA ")).unwrap();
    repo.save_session(key, &session.snapshot()).await.unwrap();

    let snapshot = repo.load_session(key).await.unwrap().expect("stored");
    assert_eq!(snapshot.state, SessionState::InProgress);
    let restored = QuizSession::from_snapshot(&bank, snapshot).unwrap();
    assert_eq!(restored, session);
}

#[tokio::test]
async fn sqlite_save_overwrites_and_delete_removes() {
    let repo = connect("memdb_overwrite").await;
    let bank = QuestionBank::embedded().unwrap();
    let key = SessionKey::generate();

    let mut session = QuizSession::new(&bank);
    repo.save_session(key, &session.snapshot()).await.unwrap();
    session.start(fixed_now()).unwrap();
    repo.save_session(key, &session.snapshot()).await.unwrap();

    let loaded = repo.load_session(key).await.unwrap().unwrap();
    assert_eq!(loaded.state, SessionState::InProgress);

    repo.delete_session(key).await.unwrap();
    assert!(repo.load_session(key).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_stores_reports() {
    let repo = connect("memdb_reports").await;
    let bank = QuestionBank::embedded().unwrap();

    let mut session = QuizSession::new(&bank);
    session.start(fixed_now()).unwrap();
    session.submit_answer(RawAnswer::choice(1)).unwrap();
    while !session.is_completed() {
        session.advance(fixed_now()).unwrap();
    }
    let report = summarize(&session, &bank).unwrap();

    let key = SessionKey::generate();
    let first = repo.append_report(key, &report).await.unwrap();
    let second = repo.append_report(key, &report).await.unwrap();

    let fetched = repo.get_report(first).await.unwrap();
    assert_eq!(fetched, report);
    assert_eq!(fetched.correct_count(), 1);

    let rows = repo.list_reports(5).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, second);
    assert_eq!(rows[0].session_key, key);

    assert_eq!(repo.report_id_for_session(key).await.unwrap(), Some(first));
    assert_eq!(
        repo.report_id_for_session(SessionKey::generate()).await.unwrap(),
        None
    );

    assert!(matches!(
        repo.get_report(second + 100).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate").await;
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn storage_facade_uses_sqlite_backend() {
    let storage = Storage::sqlite("sqlite:file:memdb_facade?mode=memory&cache=shared")
        .await
        .expect("storage");
    let key = SessionKey::generate();
    assert!(storage.sessions.load_session(key).await.unwrap().is_none());
    assert!(storage.reports.list_reports(10).await.unwrap().is_empty());
}
