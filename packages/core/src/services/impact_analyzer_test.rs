//! Tests for deletion impact analysis

#[cfg(test)]
mod impact_tests {
    use crate::db::{Collection, Document, DocumentStore, MemoryStore};
    use crate::models::{DeleteOptions, IssueRef, ProjectRef};
    use crate::services::impact_analyzer::ImpactAnalyzer;
    use crate::services::test_support::{doc, issue_doc, project_doc};
    use serde_json::json;
    use std::sync::Arc;

    async fn seed(store: &MemoryStore, collection: Collection, docs: Vec<Document>) {
        for d in docs {
            store.insert(collection, d).await.unwrap();
        }
    }

    /// API-1 ─┬─ API-2 ── API-4
    ///        └─ API-3
    /// API-5 (unrelated root)
    async fn tree_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, Collection::Projects, vec![project_doc("p1", "API", Some(5))]).await;
        seed(
            &store,
            Collection::Issues,
            vec![
                issue_doc("i1", "p1", "API-1", 1, None, 2),
                issue_doc("i2", "p1", "API-2", 2, Some("i1"), 1),
                issue_doc("i3", "p1", "API-3", 3, Some("i1"), 0),
                issue_doc("i4", "p1", "API-4", 4, Some("i2"), 0),
                issue_doc("i5", "p1", "API-5", 5, None, 0),
            ],
        )
        .await;
        store
    }

    #[tokio::test]
    async fn test_leaf_issue_has_no_blockers() {
        let store = tree_store().await;
        let analyzer = ImpactAnalyzer::new(store);

        let impact = analyzer
            .analyze_issue_deletion(&IssueRef::parse("API-4"), &DeleteOptions::new())
            .await
            .unwrap();

        assert_eq!(impact.target.id, "i4");
        assert_eq!(impact.direct_count, 1);
        assert_eq!(impact.cascade_count(), 0);
        assert_eq!(impact.total_count(), 1);
        assert!(!impact.is_blocked());
        assert!(impact.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_subtree_is_enumerated_breadth_first() {
        let store = tree_store().await;
        let analyzer = ImpactAnalyzer::new(store);

        let impact = analyzer
            .analyze_issue_deletion(&IssueRef::Id("i1".to_string()), &DeleteOptions::new())
            .await
            .unwrap();

        let ids: Vec<&str> = impact
            .descendants
            .iter()
            .map(|n| n.issue.id.as_str())
            .collect();
        assert_eq!(ids, vec!["i2", "i3", "i4"]);
        assert_eq!(impact.descendants[2].depth, 2);
        assert_eq!(impact.descendants[2].parent_index, Some(0));
        assert_eq!(impact.descendants[0].parent_index, None);
        assert_eq!(impact.total_count(), 4);

        // Children always come before their parents when removing
        let order: Vec<&str> = impact
            .removal_order()
            .map(|n| n.issue.id.as_str())
            .collect();
        let pos = |id: &str| order.iter().position(|o| *o == id).unwrap();
        assert!(pos("i4") < pos("i2"));
    }

    #[tokio::test]
    async fn test_blocker_without_cascade_or_force() {
        let store = tree_store().await;
        let analyzer = ImpactAnalyzer::new(store);
        let target = IssueRef::parse("API-1");

        let impact = analyzer
            .analyze_issue_deletion(&target, &DeleteOptions::new())
            .await
            .unwrap();
        assert!(impact.is_blocked());
        assert!(impact.blockers[0].contains("3 sub-issues"));

        for options in [DeleteOptions::new().cascade(), DeleteOptions::new().force()] {
            let impact = analyzer
                .analyze_issue_deletion(&target, &options)
                .await
                .unwrap();
            assert!(!impact.is_blocked());
            assert_eq!(impact.cascade_count(), 3);
        }
    }

    #[tokio::test]
    async fn test_analysis_performs_no_writes() {
        let store = tree_store().await;
        let before = store.mutation_count();
        let analyzer = ImpactAnalyzer::new(store.clone());

        analyzer
            .analyze_issue_deletion(&IssueRef::parse("API-1"), &DeleteOptions::new().cascade())
            .await
            .unwrap();
        analyzer
            .analyze_project_deletion(&ProjectRef::parse("API"), &DeleteOptions::new())
            .await
            .unwrap();

        assert_eq!(store.mutation_count(), before);
    }

    #[tokio::test]
    async fn test_cycle_terminates_with_warning() {
        // c1 -> c2 -> c3 -> c1 through corrupted parent links
        let store = Arc::new(MemoryStore::new());
        seed(&store, Collection::Projects, vec![project_doc("p1", "API", Some(3))]).await;
        seed(
            &store,
            Collection::Issues,
            vec![
                issue_doc("c1", "p1", "API-1", 1, Some("c3"), 1),
                issue_doc("c2", "p1", "API-2", 2, Some("c1"), 1),
                issue_doc("c3", "p1", "API-3", 3, Some("c2"), 1),
            ],
        )
        .await;
        let analyzer = ImpactAnalyzer::new(store);

        let impact = analyzer
            .analyze_issue_deletion(&IssueRef::parse("API-1"), &DeleteOptions::new().cascade())
            .await
            .unwrap();

        assert_eq!(impact.cascade_count(), 2);
        assert!(impact.warnings.iter().any(|w| w.contains("cycle detected")));
    }

    #[tokio::test]
    async fn test_corruption_warnings() {
        let store = Arc::new(MemoryStore::new());
        seed(
            &store,
            Collection::Projects,
            vec![project_doc("p1", "API", Some(1)), project_doc("p2", "WEB", Some(1))],
        )
        .await;
        seed(
            &store,
            Collection::Issues,
            vec![
                // Counter claims 4 children, only one is live
                issue_doc("r", "p1", "API-1", 1, None, 4),
                issue_doc("x", "p2", "WEB-1", 1, Some("r"), 0),
            ],
        )
        .await;
        let analyzer = ImpactAnalyzer::new(store);

        let impact = analyzer
            .analyze_issue_deletion(&IssueRef::parse("API-1"), &DeleteOptions::new().force())
            .await
            .unwrap();

        assert!(impact
            .warnings
            .iter()
            .any(|w| w.contains("child counter of API-1 is 4")));
        assert!(impact
            .warnings
            .iter()
            .any(|w| w.contains("WEB-1 belongs to a different project")));
    }

    #[tokio::test]
    async fn test_missing_issue_is_not_found() {
        let store = tree_store().await;
        let analyzer = ImpactAnalyzer::new(store);

        let err = analyzer
            .analyze_issue_deletion(&IssueRef::parse("API-99"), &DeleteOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_project_impact_lists_everything_owned() {
        let store = tree_store().await;
        seed(
            &store,
            Collection::Components,
            vec![doc(json!({
                "id": "c1", "projectId": "p1", "name": "Backend",
                "createdAt": "2024-01-01T00:00:00Z"
            }))],
        )
        .await;
        seed(
            &store,
            Collection::Templates,
            vec![doc(json!({
                "id": "t1", "projectId": "p1", "name": "Bug", "body": "Steps",
                "createdAt": "2024-01-01T00:00:00Z"
            }))],
        )
        .await;
        let analyzer = ImpactAnalyzer::new(store);
        let project = ProjectRef::parse("API");

        let impact = analyzer
            .analyze_project_deletion(&project, &DeleteOptions::new())
            .await
            .unwrap();
        assert_eq!(impact.issues.len(), 5);
        assert_eq!(impact.components.len(), 1);
        assert!(impact.milestones.is_empty());
        assert_eq!(impact.templates.len(), 1);
        assert_eq!(impact.total_count(), 8);
        assert!(impact.is_blocked());

        let forced = analyzer
            .analyze_project_deletion(&project, &DeleteOptions::new().force())
            .await
            .unwrap();
        assert!(!forced.is_blocked());
        assert!(forced.warnings.iter().any(|w| w.contains("5 issue(s)")));
    }

    #[tokio::test]
    async fn test_empty_project_is_not_blocked() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, Collection::Projects, vec![project_doc("p1", "API", Some(0))]).await;
        let analyzer = ImpactAnalyzer::new(store);

        let impact = analyzer
            .analyze_project_deletion(&ProjectRef::Id("p1".to_string()), &DeleteOptions::new())
            .await
            .unwrap();
        assert!(!impact.is_blocked());
        assert_eq!(impact.total_count(), 1);
    }

    #[tokio::test]
    async fn test_component_impact_lists_dependents() {
        let store = tree_store().await;
        seed(
            &store,
            Collection::Components,
            vec![doc(json!({
                "id": "c1", "projectId": "p1", "name": "Backend",
                "createdAt": "2024-01-01T00:00:00Z"
            }))],
        )
        .await;
        store
            .update_fields(
                Collection::Issues,
                "i3",
                doc(json!({ "componentId": "c1" })),
            )
            .await
            .unwrap();
        let analyzer = ImpactAnalyzer::new(store);

        let impact = analyzer
            .analyze_component_deletion("c1", &DeleteOptions::new())
            .await
            .unwrap();
        assert_eq!(impact.target_name, "Backend");
        assert_eq!(impact.dependent_issues.len(), 1);
        assert_eq!(impact.dependent_issues[0].identifier, "API-3");
        assert!(impact.is_blocked());

        let err = analyzer
            .analyze_milestone_deletion("c1", &DeleteOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
