use std::sync::{Arc, Mutex};

use serde_json::json;
use speculate2::speculate;
use uuid::Uuid;

use worktrail::db::Database;
use worktrail::error::Error;
use worktrail::events::ChangeKind;
use worktrail::models::*;

fn task_ref() -> EntityRef {
    EntityRef::new(EntityKind::Task, Uuid::new_v4())
}

fn story_ref() -> EntityRef {
    EntityRef::new(EntityKind::Story, Uuid::new_v4())
}

fn start_input(actor: &str) -> StartSessionInput {
    StartSessionInput {
        actor: actor.to_string(),
        active_entity: None,
        phase: None,
    }
}

fn annotation_input(entity: EntityRef, confidence: f64) -> CreateAnnotationInput {
    CreateAnnotationInput {
        entity,
        dimension: "architecture".to_string(),
        category: "constraint".to_string(),
        content: "uses the shared journal".to_string(),
        confidence,
        evidence: None,
        extensions: Extensions::new(),
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "relations" {
        describe "create_relation" {
            it "stores a typed edge between two entities" {
                let source = task_ref();
                let target = task_ref();
                let relation = db.create_relation(
                    source,
                    target,
                    RelationType::Blocks,
                    Some("waiting on schema".to_string()),
                ).expect("Failed to create relation");

                assert_eq!(relation.source, source);
                assert_eq!(relation.target, target);
                assert_eq!(relation.relation_type, RelationType::Blocks);
                assert_eq!(relation.description.as_deref(), Some("waiting on schema"));
            }

            it "allows duplicate edges and self-loops" {
                let a = task_ref();
                db.create_relation(a, a, RelationType::RelatesTo, None).expect("self-loop");
                db.create_relation(a, a, RelationType::RelatesTo, None).expect("duplicate");

                let relations = db.relations_for_entity(a).expect("Query failed");
                assert_eq!(relations.len(), 2);
            }
        }

        describe "create_bidirectional_relation" {
            it "creates forward and inverse as independent rows" {
                let s = task_ref();
                let t = task_ref();
                let pair = db.create_bidirectional_relation(s, t, RelationType::Blocks, None)
                    .expect("Failed to create pair");

                assert_eq!(pair.forward.relation_type, RelationType::Blocks);
                assert_eq!(pair.forward.source, s);
                assert_eq!(pair.forward.target, t);
                assert_eq!(pair.inverse.relation_type, RelationType::BlockedBy);
                assert_eq!(pair.inverse.source, t);
                assert_eq!(pair.inverse.target, s);
                assert_ne!(pair.forward.id, pair.inverse.id);
            }

            it "deleting the forward edge leaves the inverse retrievable" {
                let pair = db.create_bidirectional_relation(
                    task_ref(),
                    task_ref(),
                    RelationType::Blocks,
                    None,
                ).expect("Failed to create pair");

                db.delete_relation(pair.forward.id).expect("Failed to delete forward");

                assert!(db.get_relation(pair.forward.id).expect("Query failed").is_none());
                let inverse = db.get_relation(pair.inverse.id).expect("Query failed");
                assert!(inverse.is_some());
                assert_eq!(inverse.unwrap().relation_type, RelationType::BlockedBy);
            }

            it "keeps self-inverse types symmetric" {
                let pair = db.create_bidirectional_relation(
                    task_ref(),
                    task_ref(),
                    RelationType::Duplicates,
                    None,
                ).expect("Failed to create pair");

                assert_eq!(pair.inverse.relation_type, RelationType::Duplicates);
            }
        }

        describe "queries" {
            it "find_blockers returns only blocking edges aimed at the entity" {
                let blocked = task_ref();
                let blocker = task_ref();
                db.create_relation(blocker, blocked, RelationType::Blocks, None)
                    .expect("Failed to create");
                db.create_relation(task_ref(), blocked, RelationType::RelatesTo, None)
                    .expect("Failed to create");
                db.create_relation(blocked, task_ref(), RelationType::Blocks, None)
                    .expect("Failed to create");

                let blockers = db.find_blockers(blocked).expect("Query failed");
                assert_eq!(blockers.len(), 1);
                assert_eq!(blockers[0].source, blocker);
            }

            it "relations_by_type filters on the edge type" {
                db.create_relation(task_ref(), task_ref(), RelationType::ParentOf, None)
                    .expect("Failed to create");
                db.create_relation(task_ref(), task_ref(), RelationType::RelatesTo, None)
                    .expect("Failed to create");

                let parents = db.relations_by_type(RelationType::ParentOf).expect("Query failed");
                assert_eq!(parents.len(), 1);
            }

            it "relations_for_entity sees both directions" {
                let hub = story_ref();
                db.create_relation(hub, task_ref(), RelationType::ParentOf, None)
                    .expect("Failed to create");
                db.create_relation(task_ref(), hub, RelationType::ChildOf, None)
                    .expect("Failed to create");

                let all = db.relations_for_entity(hub).expect("Query failed");
                assert_eq!(all.len(), 2);
            }
        }

        describe "update_relation" {
            it "overwrites type, description, and extensions" {
                let relation = db.create_relation(
                    task_ref(),
                    task_ref(),
                    RelationType::RelatesTo,
                    None,
                ).expect("Failed to create");

                let mut ext = Extensions::new();
                ext.set("reviewed", true);

                let updated = db.update_relation(relation.id, UpdateRelationInput {
                    relation_type: Some(RelationType::Duplicates),
                    description: Some("same root cause".to_string()),
                    extensions: Some(ext),
                }).expect("Failed to update");

                assert_eq!(updated.relation_type, RelationType::Duplicates);
                assert_eq!(updated.description.as_deref(), Some("same root cause"));
                assert_eq!(updated.extensions.get_bool("reviewed"), Some(true));
                assert!(updated.updated_at >= relation.updated_at);
            }

            it "fails with NotFound for an unknown id" {
                let err = db.update_relation(Uuid::new_v4(), UpdateRelationInput::default())
                    .unwrap_err();
                assert!(matches!(err, Error::NotFound { .. }));
            }
        }

        describe "delete_relation" {
            it "fails with NotFound when the row is absent" {
                let err = db.delete_relation(Uuid::new_v4()).unwrap_err();
                assert!(matches!(err, Error::NotFound { .. }));
            }
        }
    }

    describe "history" {
        describe "append_history" {
            it "computes the diff for updated actions" {
                let entity = task_ref();
                let before = json!({"title": "Old", "status": "pending", "priority": 2});
                let after = json!({"title": "New", "status": "pending", "priority": 2});

                let entry = db.append_history(
                    entity,
                    HistoryAction::Updated,
                    "ana",
                    Some(&before),
                    Some(&after),
                    None,
                ).expect("Failed to append");

                assert_eq!(entry.changes.len(), 1);
                let change = entry.changes.get("title").expect("title changed");
                assert_eq!(change.from, json!("Old"));
                assert_eq!(change.to, json!("New"));
                assert!(entry.previous_state.is_none());
                assert!(entry.summary.contains("updated"));
            }

            it "stores the created snapshot with empty changes" {
                let after = json!({"title": "Fresh"});
                let entry = db.append_history(
                    task_ref(),
                    HistoryAction::Created,
                    "ana",
                    None,
                    Some(&after),
                    None,
                ).expect("Failed to append");

                assert!(entry.changes.is_empty());
                assert_eq!(entry.previous_state, Some(after));
            }

            it "stores the deleted snapshot with empty changes" {
                let before = json!({"title": "Doomed", "status": "failed"});
                let entry = db.append_history(
                    task_ref(),
                    HistoryAction::Deleted,
                    "ana",
                    Some(&before),
                    None,
                    None,
                ).expect("Failed to append");

                assert!(entry.changes.is_empty());
                assert_eq!(entry.previous_state, Some(before));
            }

            it "tags the entry with the given session id" {
                let session = db.start_session(start_input("ana")).expect("Failed to start");
                let entry = db.append_history(
                    task_ref(),
                    HistoryAction::Commented,
                    "ana",
                    None,
                    None,
                    Some(session.id),
                ).expect("Failed to append");

                assert_eq!(entry.session_id, Some(session.id));
                let by_session = db.history_by_session(session.id).expect("Query failed");
                assert_eq!(by_session.len(), 1);
                assert_eq!(by_session[0].id, entry.id);
            }
        }

        describe "queries" {
            it "filters by entity, actor, and action" {
                let entity = task_ref();
                db.append_history(entity, HistoryAction::Created, "ana", None, None, None)
                    .expect("Failed to append");
                db.append_history(entity, HistoryAction::Verified, "bot", None, None, None)
                    .expect("Failed to append");
                db.append_history(task_ref(), HistoryAction::Created, "bot", None, None, None)
                    .expect("Failed to append");

                assert_eq!(db.history_for_entity(entity).expect("Query failed").len(), 2);
                assert_eq!(db.history_by_actor("bot").expect("Query failed").len(), 2);
                assert_eq!(
                    db.history_by_action(HistoryAction::Created).expect("Query failed").len(),
                    2
                );
            }

            it "filters by time range" {
                let before_write = chrono::Utc::now();
                let entry = db.append_history(
                    task_ref(),
                    HistoryAction::Created,
                    "ana",
                    None,
                    None,
                    None,
                ).expect("Failed to append");
                let after_write = chrono::Utc::now();

                let hits = db.history_in_range(before_write, after_write).expect("Query failed");
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].id, entry.id);

                let misses = db.history_in_range(
                    after_write + chrono::Duration::seconds(1),
                    after_write + chrono::Duration::seconds(2),
                ).expect("Query failed");
                assert!(misses.is_empty());
            }
        }
    }

    describe "sessions" {
        describe "start_session" {
            it "creates an active session" {
                let session = db.start_session(StartSessionInput {
                    actor: "ana".to_string(),
                    active_entity: Some(task_ref()),
                    phase: Some("planning".to_string()),
                }).expect("Failed to start");

                assert!(session.is_active());
                assert_eq!(session.phase.as_deref(), Some("planning"));
                let active = db.find_active_session().expect("Query failed");
                assert_eq!(active.map(|s| s.id), Some(session.id));
            }

            it "fails when another session is active, even for a different actor" {
                let first = db.start_session(start_input("ana")).expect("Failed to start");
                let err = db.start_session(start_input("bot")).unwrap_err();
                assert!(matches!(err, Error::SessionAlreadyActive(id) if id == first.id));
            }

            it "allows a new session once the previous one ends" {
                let first = db.start_session(start_input("ana")).expect("Failed to start");
                db.end_session(first.id).expect("Failed to end");
                db.start_session(start_input("ana")).expect("Failed to restart");
            }
        }

        describe "end_session" {
            it "fails with a state error when no session is active" {
                let err = db.end_session(Uuid::new_v4()).unwrap_err();
                assert!(matches!(err, Error::State(_)));
            }

            it "fails when the id is not the active session" {
                db.start_session(start_input("ana")).expect("Failed to start");
                let err = db.end_session(Uuid::new_v4()).unwrap_err();
                assert!(matches!(err, Error::State(_)));
            }

            it "duration of an ended session is exactly ended minus started" {
                let session = db.start_session(start_input("ana")).expect("Failed to start");
                let ended = db.end_session(session.id).expect("Failed to end");

                assert!(!ended.is_active());
                assert_eq!(
                    ended.duration(),
                    ended.ended_at.expect("ended") - ended.started_at
                );
            }
        }

        describe "mutating the session in place" {
            it "switch_session_entity repoints the session" {
                let session = db.start_session(start_input("ana")).expect("Failed to start");
                let next = story_ref();
                let switched = db.switch_session_entity(session.id, next).expect("Failed to switch");
                assert_eq!(switched.active_entity, Some(next));

                let reread = db.get_session(session.id).expect("Query failed").expect("exists");
                assert_eq!(reread.active_entity, Some(next));
            }

            it "set_session_phase updates the phase label" {
                let session = db.start_session(start_input("ana")).expect("Failed to start");
                db.set_session_phase(session.id, "review").expect("Failed to set phase");

                let reread = db.get_session(session.id).expect("Query failed").expect("exists");
                assert_eq!(reread.phase.as_deref(), Some("review"));
            }

            it "fails with NotFound for an unknown session" {
                let err = db.set_session_phase(Uuid::new_v4(), "review").unwrap_err();
                assert!(matches!(err, Error::NotFound { .. }));
            }
        }
    }

    describe "annotations" {
        describe "create_annotation" {
            it "rejects out-of-range confidence" {
                let err = db.create_annotation(annotation_input(task_ref(), 1.2)).unwrap_err();
                assert!(matches!(err, Error::InvalidInput(_)));
            }
        }

        describe "update_annotation_confidence" {
            it "blends 0.5 with evidence 1.0 at weight 1 to 0.75" {
                let annotation = db.create_annotation(annotation_input(task_ref(), 0.5))
                    .expect("Failed to create");

                let updated = db.update_annotation_confidence(annotation.id, 1.0, 1.0)
                    .expect("Failed to blend");
                assert!((updated.confidence - 0.75).abs() < 1e-12);
            }

            it "stays within [0, 1] for valid inputs" {
                let annotation = db.create_annotation(annotation_input(task_ref(), 1.0))
                    .expect("Failed to create");

                let mut id = annotation.id;
                for evidence in [1.0, 0.0, 0.3, 1.0] {
                    let updated = db.update_annotation_confidence(id, evidence, 2.5)
                        .expect("Failed to blend");
                    assert!((0.0..=1.0).contains(&updated.confidence));
                    id = updated.id;
                }
            }

            it "rejects non-positive weight and out-of-range evidence" {
                let annotation = db.create_annotation(annotation_input(task_ref(), 0.5))
                    .expect("Failed to create");

                let err = db.update_annotation_confidence(annotation.id, 0.5, 0.0).unwrap_err();
                assert!(matches!(err, Error::InvalidInput(_)));
                let err = db.update_annotation_confidence(annotation.id, 1.5, 1.0).unwrap_err();
                assert!(matches!(err, Error::InvalidInput(_)));
            }

            it "fails with NotFound for an unknown annotation" {
                let err = db.update_annotation_confidence(Uuid::new_v4(), 0.5, 1.0).unwrap_err();
                assert!(matches!(err, Error::NotFound { .. }));
            }
        }

        describe "update_annotation" {
            it "overwrites fields directly and clamps confidence" {
                let annotation = db.create_annotation(annotation_input(task_ref(), 0.5))
                    .expect("Failed to create");

                let updated = db.update_annotation(annotation.id, UpdateAnnotationInput {
                    content: Some("revised".to_string()),
                    confidence: Some(7.0),
                    ..Default::default()
                }).expect("Failed to update");

                assert_eq!(updated.content, "revised");
                assert_eq!(updated.confidence, 1.0);
            }
        }

        describe "queries" {
            it "filters by entity and by dimension" {
                let entity = task_ref();
                db.create_annotation(annotation_input(entity, 0.4)).expect("Failed to create");
                let mut other = annotation_input(task_ref(), 0.6);
                other.dimension = "risk".to_string();
                db.create_annotation(other).expect("Failed to create");

                assert_eq!(db.annotations_for_entity(entity).expect("Query failed").len(), 1);
                assert_eq!(db.annotations_by_dimension("risk").expect("Query failed").len(), 1);
            }
        }
    }

    describe "change events" {
        it "publishes one event per committed mutation, in order" {
            let seen: Arc<Mutex<Vec<(&'static str, ChangeKind)>>> =
                Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            db.events().subscribe(move |event| {
                sink.lock().unwrap().push((event.table, event.kind));
            });

            let relation = db.create_relation(task_ref(), task_ref(), RelationType::Blocks, None)
                .expect("Failed to create");
            db.delete_relation(relation.id).expect("Failed to delete");
            let session = db.start_session(start_input("ana")).expect("Failed to start");
            db.end_session(session.id).expect("Failed to end");

            assert_eq!(*seen.lock().unwrap(), vec![
                ("relations", ChangeKind::Created),
                ("relations", ChangeKind::Deleted),
                ("sessions", ChangeKind::Created),
                ("sessions", ChangeKind::Updated),
            ]);
        }

        it "stops delivering after unsubscribe" {
            let seen = Arc::new(Mutex::new(0usize));
            let sink = seen.clone();
            let token = db.events().subscribe(move |_| {
                *sink.lock().unwrap() += 1;
            });

            db.create_relation(task_ref(), task_ref(), RelationType::RelatesTo, None)
                .expect("Failed to create");
            assert!(db.events().unsubscribe(token));
            db.create_relation(task_ref(), task_ref(), RelationType::RelatesTo, None)
                .expect("Failed to create");

            assert_eq!(*seen.lock().unwrap(), 1);
        }
    }
}
