mod common;

use common::Fixture;
use recording_vault_lib::access::{Column, CompareOp};
use recording_vault_lib::recording::{OrderKey, OrderTerm, RecordingId};
use recording_vault_lib::{Predicate, RecordingQuery, User};

#[cfg(test)]
mod visibility_query_tests {
    use super::*;

    fn ids(page: &recording_vault_lib::RecordingPage) -> Vec<RecordingId> {
        page.rows.iter().map(|row| row.recording.id).collect()
    }

    /// Group member sees own and public recordings but may only change their own
    #[tokio::test]
    async fn test_group_and_public_visibility_scenario() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let g2 = fixture.group("g2").await;
        let d1 = fixture.device("d1", g1).await;
        let d2 = fixture.device("d2", g2).await;
        fixture.join_group(1, g1).await;

        let r1 = fixture.thermal(d1, g1, None).await;
        let r2 = fixture.thermal(d2, g2, None).await;
        let r3 = fixture.thermal(d2, g2, None).await;
        fixture.set_public(r2, true).await;

        let user = User::new(1);
        let page = fixture
            .service
            .query_with(&user, Predicate::True, None, 0, Some(10), None)
            .await
            .unwrap();

        let visible = ids(&page);
        assert!(visible.contains(&r1));
        assert!(visible.contains(&r2));
        assert!(!visible.contains(&r3));
        assert_eq!(page.count, 2);

        let own = &page.rows.iter().find(|row| row.recording.id == r1).unwrap().recording;
        let public = &page.rows.iter().find(|row| row.recording.id == r2).unwrap().recording;

        let own_permissions = fixture.service.get_user_permissions(own, &user).await.unwrap();
        assert!(own_permissions.can_delete);
        let public_permissions = fixture
            .service
            .get_user_permissions(public, &user)
            .await
            .unwrap();
        assert!(!public_permissions.can_delete);
        assert!(!public_permissions.can_view);
    }

    /// Direct device association makes a private recording visible
    #[tokio::test]
    async fn test_device_association_grants_visibility() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        let recording = fixture.thermal(d1, g1, None).await;

        let user = User::new(2);
        assert!(fixture.service.get_one(&user, recording).await.unwrap().is_none());

        fixture.join_device(2, d1).await;
        let view = fixture.service.get_one(&user, recording).await.unwrap().unwrap();
        assert_eq!(view.device.device_name, "d1");
        assert_eq!(view.group.as_ref().map(|g| g.group_name.as_str()), Some("g1"));
    }

    /// Listings never expose the raw file key; single fetches do
    #[tokio::test]
    async fn test_raw_file_key_only_on_single_fetch() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        fixture.join_group(1, g1).await;
        let recording = fixture.thermal(d1, g1, None).await;

        let user = User::new(1);
        let page = fixture.service.query(&user, RecordingQuery::new()).await.unwrap();
        assert_eq!(page.rows[0].recording.raw_file_key, None);
        assert_eq!(page.rows[0].recording.job_key, None);

        let view = fixture.service.get_one(&user, recording).await.unwrap().unwrap();
        assert!(view.recording.raw_file_key.unwrap().starts_with("raw/"));
        assert_eq!(view.recording.processing_state.as_deref(), Some("toMp4"));
    }

    /// Tagged-only and untagged-only split the visible set exactly
    #[tokio::test]
    async fn test_tag_filters_partition_visible_recordings() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        fixture.join_group(1, g1).await;

        let mut all = Vec::new();
        for index in 0..5 {
            let id = fixture.thermal(d1, g1, None).await;
            if index % 2 == 0 {
                fixture.add_tag(id, "possum").await;
            }
            all.push(id);
        }

        let user = User::new(1);
        let tagged = fixture
            .service
            .query(&user, RecordingQuery::new().tagged(Some(true)))
            .await
            .unwrap();
        let untagged = fixture
            .service
            .query(&user, RecordingQuery::new().tagged(Some(false)))
            .await
            .unwrap();
        let any = fixture.service.query(&user, RecordingQuery::new()).await.unwrap();

        assert_eq!(tagged.count, 3);
        assert_eq!(untagged.count, 2);
        assert_eq!(any.count, 5);
        assert!(tagged.rows.iter().all(|row| !row.tags.is_empty()));
        assert!(untagged.rows.iter().all(|row| row.tags.is_empty()));

        let mut union: Vec<RecordingId> = ids(&tagged).into_iter().chain(ids(&untagged)).collect();
        union.sort_unstable();
        all.sort_unstable();
        assert_eq!(union, all);
    }

    /// Newest capture first, undated as the epoch, ties by descending id
    #[tokio::test]
    async fn test_default_order() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        fixture.join_group(1, g1).await;

        let january = fixture.thermal(d1, g1, Some("2023-01-01T00:00:00Z")).await;
        let undated = fixture.thermal(d1, g1, None).await;
        let june = fixture.thermal(d1, g1, Some("2023-06-01T08:30:00Z")).await;
        let june_again = fixture.thermal(d1, g1, Some("2023-06-01T08:30:00Z")).await;
        let before_epoch = fixture.thermal(d1, g1, Some("1969-07-20T20:17:00Z")).await;

        let user = User::new(1);
        let first = fixture.service.query(&user, RecordingQuery::new()).await.unwrap();
        assert_eq!(
            ids(&first),
            vec![june_again, june, january, undated, before_epoch]
        );

        let second = fixture.service.query(&user, RecordingQuery::new()).await.unwrap();
        assert_eq!(ids(&first), ids(&second));
    }

    /// Custom order gets an id tiebreak so equal keys stay stable
    #[tokio::test]
    async fn test_custom_order_with_tiebreak() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        fixture.join_group(1, g1).await;

        let short = fixture
            .upload(d1, g1, serde_json::json!({"type": "thermalRaw", "duration": 5}))
            .await;
        let long_a = fixture
            .upload(d1, g1, serde_json::json!({"type": "thermalRaw", "duration": 30}))
            .await;
        let long_b = fixture
            .upload(d1, g1, serde_json::json!({"type": "thermalRaw", "duration": 30}))
            .await;

        let page = fixture
            .service
            .query(
                &User::new(1),
                RecordingQuery::new().order(vec![OrderTerm::asc(OrderKey::Duration)]),
            )
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![short, long_b, long_a]);
    }

    /// Pages follow the order and the count ignores paging
    #[tokio::test]
    async fn test_paging_and_count() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        fixture.join_group(1, g1).await;
        for _ in 0..5 {
            fixture.thermal(d1, g1, None).await;
        }

        let user = User::new(1);
        let full = fixture.service.query(&user, RecordingQuery::new()).await.unwrap();
        let first = fixture
            .service
            .query(&user, RecordingQuery::new().limit(2))
            .await
            .unwrap();
        let rest = fixture
            .service
            .query(&user, RecordingQuery::new().offset(2))
            .await
            .unwrap();

        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.count, 5);
        assert_eq!(rest.rows.len(), 3);

        let stitched: Vec<RecordingId> = ids(&first).into_iter().chain(ids(&rest)).collect();
        assert_eq!(stitched, ids(&full));
    }

    /// Caller filters narrow, never widen, what a user sees
    #[tokio::test]
    async fn test_filter_is_combined_with_visibility() {
        let fixture = Fixture::new().await;
        let g1 = fixture.group("g1").await;
        let g2 = fixture.group("g2").await;
        let d1 = fixture.device("d1", g1).await;
        let d2 = fixture.device("d2", g2).await;
        fixture.join_group(1, g1).await;

        let audio = fixture
            .upload(d1, g1, serde_json::json!({"type": "audio", "duration": 60}))
            .await;
        fixture.thermal(d1, g1, None).await;
        fixture
            .upload(d2, g2, serde_json::json!({"type": "audio", "duration": 60}))
            .await;

        let page = fixture
            .service
            .query(
                &User::new(1),
                RecordingQuery::new().filter(Predicate::eq(Column::RecordingType, "audio")),
            )
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![audio]);

        let widened = Predicate::Or(vec![
            Predicate::eq(Column::GroupId, g2),
            Predicate::compare(Column::Duration, CompareOp::Gte, 0_i64),
        ]);
        let page = fixture
            .service
            .query(&User::new(1), RecordingQuery::new().filter(widened))
            .await
            .unwrap();
        assert_eq!(page.count, 2);
    }

    /// Configured limits cap requested page sizes
    #[tokio::test]
    async fn test_max_limit_caps_page_size() {
        let config = recording_vault_lib::AccessConfig {
            max_limit: Some(2),
            ..recording_vault_lib::AccessConfig::in_memory()
        };
        let fixture = Fixture::with_config(config).await;
        let g1 = fixture.group("g1").await;
        let d1 = fixture.device("d1", g1).await;
        fixture.join_group(1, g1).await;
        for _ in 0..4 {
            fixture.thermal(d1, g1, None).await;
        }

        let page = fixture
            .service
            .query(&User::new(1), RecordingQuery::new().limit(50))
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.count, 4);

        let negative = fixture
            .service
            .query(&User::new(1), RecordingQuery::new().limit(-1))
            .await
            .unwrap();
        assert_eq!(negative.rows.len(), 2);
        assert_eq!(negative.count, 4);
    }
}
