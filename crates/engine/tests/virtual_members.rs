mod common;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};

use common::{PASSWORD, count_rows, engine_with_db, eur_expense, register, trip_with};
use engine::{
    ActorContext, Credentials, EngineError, LifecycleCommand, Money, NewAccount,
};

async fn insert_marker(db: &DatabaseConnection, command: &LifecycleCommand, payload: String) {
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO pending_operations (kind, trip_id, subject_id, payload, created_at) \
         VALUES (?, ?, ?, ?, ?)",
        vec![
            command.kind().into(),
            command.trip_id().into(),
            command.virtual_id().into(),
            payload.into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();
}

#[tokio::test]
async fn virtual_members_cannot_log_in() {
    let (engine, _db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let trip = trip_with(&engine, a, &[]).await;

    let ghost = engine
        .create_virtual_member(a, trip.id, "  Ghost ")
        .await
        .unwrap();
    assert!(ghost.is_virtual);
    assert_eq!(ghost.display_name, "Ghost");
    assert!(ghost.username.starts_with("v-"));
    assert_eq!(ghost.username.len(), 10);

    assert_eq!(
        engine
            .login(Credentials::new(ghost.username.clone(), PASSWORD))
            .await
            .unwrap_err(),
        EngineError::InvalidCredentials
    );
}

#[tokio::test]
async fn only_admins_create_virtual_members() {
    let (engine, _db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let b = register(&engine, "bob").await;
    let trip = trip_with(&engine, a, &[b]).await;

    assert!(matches!(
        engine.create_virtual_member(b, trip.id, "Ghost").await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        engine.create_virtual_member(a, trip.id, "   ").await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn link_moves_ledger_and_membership_to_a_new_member() {
    let (engine, db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let r = register(&engine, "rita").await;
    let trip = trip_with(&engine, a, &[]).await;
    let ghost = engine
        .create_virtual_member(a, trip.id, "Rita")
        .await
        .unwrap();
    let v = ActorContext::new(ghost.user_id);

    let paid_by_v = engine
        .record_expense(a, trip.id, eur_expense(v, "40", &[a, v]))
        .await
        .unwrap();
    engine
        .record_expense(a, trip.id, eur_expense(a, "12", &[v]))
        .await
        .unwrap();
    let before = engine.compute_settlement(a, trip.id).await.unwrap();

    let session = engine
        .link_virtual_member(trip.id, v.user_id, &trip.code, Credentials::new("rita", PASSWORD))
        .await
        .unwrap();
    assert_eq!(session.user_id, r.user_id);
    assert_eq!(
        engine.actor_for_session(&session.token).await.unwrap(),
        r
    );

    let members = engine.list_members(a, trip.id).await.unwrap();
    let ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
    assert_eq!(ids, vec![a.user_id, r.user_id]);
    assert_eq!(members[1].joined_at, ghost.joined_at);

    let expenses = engine.list_expenses(r, trip.id).await.unwrap();
    let moved = expenses.iter().find(|e| e.id == paid_by_v.id).unwrap();
    assert_eq!(moved.payer_id, r.user_id);
    assert!(
        expenses
            .iter()
            .flat_map(|e| e.splits.iter())
            .all(|s| s.user_id != v.user_id)
    );

    let after = engine.compute_settlement(r, trip.id).await.unwrap();
    assert_eq!(after.balances[1].user_id, r.user_id);
    assert_eq!(after.balances[1].balance, before.balances[1].balance);
    assert_eq!(after.total_expenses, before.total_expenses);

    assert_eq!(
        count_rows(
            &db,
            &format!("SELECT COUNT(*) FROM users WHERE id = {}", v.user_id)
        )
        .await,
        0
    );
    assert!(engine.pending_operations().await.unwrap().is_empty());
}

#[tokio::test]
async fn link_into_an_existing_member_merges_shares() {
    let (engine, _db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let r = register(&engine, "rita").await;
    let trip = trip_with(&engine, a, &[r]).await;
    let v = ActorContext::new(
        engine
            .create_virtual_member(a, trip.id, "Rita again")
            .await
            .unwrap()
            .user_id,
    );

    let expense = engine
        .record_expense(a, trip.id, eur_expense(a, "30", &[a, r, v]))
        .await
        .unwrap();

    engine
        .link_virtual_member(trip.id, v.user_id, &trip.code, Credentials::new("RITA", PASSWORD))
        .await
        .unwrap();

    let members: Vec<i64> = engine
        .list_members(a, trip.id)
        .await
        .unwrap()
        .iter()
        .map(|m| m.user_id)
        .collect();
    assert_eq!(members, vec![a.user_id, r.user_id]);

    let merged = engine
        .list_expenses(a, trip.id)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.id == expense.id)
        .unwrap();
    let shares: Vec<(i64, Money)> = merged
        .splits
        .iter()
        .map(|s| (s.user_id, s.amount))
        .collect();
    assert_eq!(
        shares,
        vec![(a.user_id, Money::new(1000)), (r.user_id, Money::new(2000))]
    );

    let settlement = engine.compute_settlement(r, trip.id).await.unwrap();
    assert_eq!(settlement.balances[1].balance, Money::new(-2000));
}

#[tokio::test]
async fn failed_link_changes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    register(&engine, "rita").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = engine
        .create_virtual_member(a, trip.id, "Rita")
        .await
        .unwrap();

    assert_eq!(
        engine
            .link_virtual_member(trip.id, v.user_id, &trip.code, Credentials::new("rita", "wrong password"))
            .await
            .unwrap_err(),
        EngineError::InvalidCredentials
    );
    assert!(matches!(
        engine
            .link_virtual_member(trip.id, a.user_id, &trip.code, Credentials::new("rita", PASSWORD))
            .await,
        Err(EngineError::KeyNotFound(_))
    ));

    let members = engine.list_members(a, trip.id).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == v.user_id));
    assert!(engine.pending_operations().await.unwrap().is_empty());
}

#[tokio::test]
async fn promote_keeps_the_id_and_enables_login() {
    let (engine, _db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = engine
        .create_virtual_member(a, trip.id, "Vera")
        .await
        .unwrap();
    let v_actor = ActorContext::new(v.user_id);
    engine
        .record_expense(a, trip.id, eur_expense(v_actor, "15", &[a, v_actor]))
        .await
        .unwrap();

    assert!(matches!(
        engine
            .promote_virtual_member(
                trip.id,
                v.user_id,
                &trip.code,
                NewAccount::new("alice", "Vera", "long enough"),
            )
            .await,
        Err(EngineError::ExistingKey(_))
    ));

    let session = engine
        .promote_virtual_member(
            trip.id,
            v.user_id,
            &trip.code,
            NewAccount::new("vera", "Vera V.", "long enough").email("Vera@Example.com"),
        )
        .await
        .unwrap();
    assert_eq!(session.user_id, v.user_id);

    let account = engine.account(v_actor).await.unwrap();
    assert!(!account.is_virtual);
    assert_eq!(account.username, "vera");
    assert_eq!(account.email.as_deref(), Some("vera@example.com"));

    let login = engine
        .login(Credentials::new("vera", "long enough"))
        .await
        .unwrap();
    assert_eq!(login.user_id, v.user_id);

    let settlement = engine.compute_settlement(v_actor, trip.id).await.unwrap();
    assert_eq!(settlement.balances[1].balance, Money::new(750));

    assert!(matches!(
        engine
            .promote_virtual_member(
                trip.id,
                v.user_id,
                &trip.code,
                NewAccount::new("vera2", "Vera", "long enough"),
            )
            .await,
        Err(EngineError::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn reconciliation_finishes_an_interrupted_link() {
    let (engine, db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let r = register(&engine, "rita").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = ActorContext::new(
        engine
            .create_virtual_member(a, trip.id, "Rita")
            .await
            .unwrap()
            .user_id,
    );
    engine
        .record_expense(a, trip.id, eur_expense(v, "20", &[a, v]))
        .await
        .unwrap();

    let command = LifecycleCommand::Link {
        trip_id: trip.id,
        virtual_id: v.user_id,
        real_id: r.user_id,
    };
    insert_marker(&db, &command, serde_json::to_string(&command).unwrap()).await;
    insert_marker(&db, &command, "{not json".to_string()).await;

    let pending = engine.pending_operations().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].command.as_ref(), Some(&command));
    assert!(pending[0].error.is_none());
    assert_eq!(pending[1].kind, "link");
    assert_eq!(pending[1].subject_id, v.user_id);
    assert!(pending[1].command.is_none());
    assert!(pending[1].error.as_deref().unwrap().contains("unreadable payload"));

    let report = engine.reconcile_pending_operations().await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].command, command);
    assert_eq!(report.failed.len(), 1);

    let expenses = engine.list_expenses(r, trip.id).await.unwrap();
    assert_eq!(expenses[0].payer_id, r.user_id);
    assert_eq!(count_rows(&db, "SELECT COUNT(*) FROM pending_operations").await, 1);

    let again = engine.reconcile_pending_operations().await.unwrap();
    assert!(again.applied.is_empty());
    assert_eq!(again.failed, report.failed);
}

#[tokio::test]
async fn replaying_an_applied_command_is_a_no_op() {
    let (engine, db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = engine
        .create_virtual_member(a, trip.id, "Vera")
        .await
        .unwrap();
    engine
        .promote_virtual_member(
            trip.id,
            v.user_id,
            &trip.code,
            NewAccount::new("vera", "Vera", "long enough"),
        )
        .await
        .unwrap();

    let command = LifecycleCommand::Promote {
        trip_id: trip.id,
        virtual_id: v.user_id,
        username: "vera".to_string(),
        display_name: "Vera".to_string(),
        email: None,
        password_hash: "unused".to_string(),
    };
    insert_marker(&db, &command, serde_json::to_string(&command).unwrap()).await;

    let report = engine.reconcile_pending_operations().await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert!(report.failed.is_empty());
    engine
        .login(Credentials::new("vera", "long enough"))
        .await
        .unwrap();
}

#[tokio::test]
async fn link_and_promote_require_the_trip_code() {
    let (engine, _db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    register(&engine, "mallory").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = engine
        .create_virtual_member(a, trip.id, "Vera")
        .await
        .unwrap();

    assert!(matches!(
        engine
            .link_virtual_member(trip.id, v.user_id, "", Credentials::new("mallory", PASSWORD))
            .await,
        Err(EngineError::Forbidden(_))
    ));
    assert!(matches!(
        engine
            .promote_virtual_member(
                trip.id,
                v.user_id,
                "zzzzzz",
                NewAccount::new("mallory2", "Mallory", "long enough"),
            )
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let members = engine.list_members(a, trip.id).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == v.user_id && m.is_virtual));
    assert!(engine.pending_operations().await.unwrap().is_empty());

    let session = engine
        .promote_virtual_member(
            trip.id,
            v.user_id,
            &format!(" {} ", trip.code.to_uppercase()),
            NewAccount::new("vera", "Vera", "long enough"),
        )
        .await
        .unwrap();
    assert_eq!(session.user_id, v.user_id);
}

#[tokio::test]
async fn stale_link_does_not_undo_a_promotion() {
    let (engine, db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let r = register(&engine, "rita").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = ActorContext::new(
        engine
            .create_virtual_member(a, trip.id, "Vera")
            .await
            .unwrap()
            .user_id,
    );
    engine
        .record_expense(a, trip.id, eur_expense(v, "20", &[a, v]))
        .await
        .unwrap();

    let command = LifecycleCommand::Link {
        trip_id: trip.id,
        virtual_id: v.user_id,
        real_id: r.user_id,
    };
    insert_marker(&db, &command, serde_json::to_string(&command).unwrap()).await;
    engine
        .promote_virtual_member(
            trip.id,
            v.user_id,
            &trip.code,
            NewAccount::new("vera", "Vera", "long enough"),
        )
        .await
        .unwrap();

    let report = engine.reconcile_pending_operations().await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("no longer virtual"));
    assert_eq!(engine.pending_operations().await.unwrap().len(), 1);

    let members: Vec<i64> = engine
        .list_members(v, trip.id)
        .await
        .unwrap()
        .iter()
        .map(|m| m.user_id)
        .collect();
    assert_eq!(members, vec![a.user_id, v.user_id]);
    let expenses = engine.list_expenses(v, trip.id).await.unwrap();
    assert_eq!(expenses[0].payer_id, v.user_id);
    assert!(matches!(
        engine.list_expenses(r, trip.id).await,
        Err(EngineError::Forbidden(_))
    ));
}

#[tokio::test]
async fn replayed_link_of_a_vanished_member_is_cleared() {
    let (engine, db) = engine_with_db().await;
    let a = register(&engine, "alice").await;
    let r = register(&engine, "rita").await;
    let trip = trip_with(&engine, a, &[]).await;
    let v = engine
        .create_virtual_member(a, trip.id, "Rita")
        .await
        .unwrap();
    engine
        .link_virtual_member(trip.id, v.user_id, &trip.code, Credentials::new("rita", PASSWORD))
        .await
        .unwrap();

    let command = LifecycleCommand::Link {
        trip_id: trip.id,
        virtual_id: v.user_id,
        real_id: r.user_id,
    };
    insert_marker(&db, &command, serde_json::to_string(&command).unwrap()).await;

    let report = engine.reconcile_pending_operations().await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert!(report.failed.is_empty());
    assert!(engine.pending_operations().await.unwrap().is_empty());
}
