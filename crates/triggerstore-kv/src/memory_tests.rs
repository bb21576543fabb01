
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn manual_store() -> (MemoryKvStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (MemoryKvStore::with_clock(clock.clone()), clock)
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_hash_set_merges_fields() {
        let store = MemoryKvStore::new();
        store
            .hash_set("h", &pairs(&[("a", "1"), ("b", "2")]))
            .await
            .unwrap();
        store.hash_set("h", &pairs(&[("b", "3")])).await.unwrap();

        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(all, pairs(&[("a", "1"), ("b", "3")]));
        assert_eq!(store.hash_get("h", "a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.hash_get("h", "zzz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_keys_read_empty() {
        let store = MemoryKvStore::new();
        assert!(store.hash_get_all("nope").await.unwrap().is_empty());
        assert!(store.set_members("nope").await.unwrap().is_empty());
        assert!(store.sorted_members("nope").await.unwrap().is_empty());
        assert_eq!(store.set_len("nope").await.unwrap(), 0);
        assert!(!store.exists("nope").await.unwrap());
        assert!(!store.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_add_remove() {
        let store = MemoryKvStore::new();
        assert!(store.set_add("s", "x").await.unwrap());
        assert!(!store.set_add("s", "x").await.unwrap());
        assert!(store.set_add("s", "a").await.unwrap());

        assert_eq!(store.set_members("s").await.unwrap(), vec!["a", "x"]);
        assert!(store.set_contains("s", "x").await.unwrap());
        assert_eq!(store.set_len("s").await.unwrap(), 2);

        assert!(store.set_remove("s", "x").await.unwrap());
        assert!(!store.set_remove("s", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_emptied_collection_is_removed() {
        let store = MemoryKvStore::new();
        store.set_add("s", "only").await.unwrap();
        store.sorted_add("z", "only", 1.0).await.unwrap();

        store.set_remove("s", "only").await.unwrap();
        store.sorted_remove("z", "only").await.unwrap();

        assert!(!store.exists("s").await.unwrap());
        assert!(!store.exists("z").await.unwrap());
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryKvStore::new();
        store.set_add("s", "x").await.unwrap();

        let err = store.hash_get_all("s").await.unwrap_err();
        assert!(matches!(err, KvError::WrongType { ref key } if key == "s"));
        assert!(store.sorted_add("s", "x", 1.0).await.is_err());
        assert!(store.string_get("s").await.is_err());
    }

    #[tokio::test]
    async fn test_sorted_orders_by_score_then_member() {
        let store = MemoryKvStore::new();
        store.sorted_add("z", "b", 2.0).await.unwrap();
        store.sorted_add("z", "c", 1.0).await.unwrap();
        store.sorted_add("z", "a", 2.0).await.unwrap();

        let members: Vec<String> = store
            .sorted_members("z")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.member)
            .collect();
        assert_eq!(members, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_sorted_rescore() {
        let store = MemoryKvStore::new();
        assert!(store.sorted_add("z", "m", 5.0).await.unwrap());
        assert!(!store.sorted_add("z", "m", 1.0).await.unwrap());

        assert_eq!(store.sorted_score("z", "m").await.unwrap(), Some(1.0));
        assert_eq!(store.sorted_members("z").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sorted_range_by_score() {
        let store = MemoryKvStore::new();
        for (member, score) in [("a", 10.0), ("b", 20.0), ("c", 30.0), ("d", 40.0)] {
            store.sorted_add("z", member, score).await.unwrap();
        }

        let range = store
            .sorted_range_by_score("z", 20.0, 40.0, None)
            .await
            .unwrap();
        assert_eq!(
            range,
            vec![
                ScoredMember::new("b", 20.0),
                ScoredMember::new("c", 30.0),
                ScoredMember::new("d", 40.0),
            ]
        );

        let limited = store
            .sorted_range_by_score("z", f64::NEG_INFINITY, f64::INFINITY, Some(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].member, "a");
    }

    #[tokio::test]
    async fn test_string_ttl_expires() {
        let (store, clock) = manual_store();
        store
            .string_set("k", "v", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(store.string_get("k").await.unwrap(), Some("v".to_string()));

        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(store.string_get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_string_ttl_saturates() {
        let (store, clock) = manual_store();
        store
            .string_set("k", "v", Some(Duration::from_millis(u64::MAX)))
            .await
            .unwrap();
        assert_eq!(store.string_get("k").await.unwrap(), Some("v".to_string()));

        clock.advance(chrono::Duration::days(365 * 100));
        assert_eq!(store.string_get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_string_set_if_absent() {
        let (store, clock) = manual_store();
        assert!(store
            .string_set_if_absent("k", "first", Some(Duration::from_secs(5)))
            .await
            .unwrap());
        assert!(!store
            .string_set_if_absent("k", "second", None)
            .await
            .unwrap());
        assert_eq!(store.string_get("k").await.unwrap(), Some("first".to_string()));

        clock.advance(chrono::Duration::seconds(6));
        assert!(store
            .string_set_if_absent("k", "third", None)
            .await
            .unwrap());
        assert_eq!(store.string_get("k").await.unwrap(), Some("third".to_string()));
    }

    #[tokio::test]
    async fn test_lock_take_and_release() {
        let (store, clock) = manual_store();
        let ttl = Duration::from_secs(30);

        assert!(store.lock_take("lock", "a", ttl).await.unwrap());
        assert!(!store.lock_take("lock", "b", ttl).await.unwrap());
        // same holder refreshes
        assert!(store.lock_take("lock", "a", ttl).await.unwrap());

        assert!(!store.lock_release("lock", "b").await.unwrap());
        assert!(store.lock_release("lock", "a").await.unwrap());
        assert!(store.lock_take("lock", "b", ttl).await.unwrap());

        clock.advance(chrono::Duration::seconds(31));
        assert!(store.lock_take("lock", "a", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = MemoryKvStore::new();
        let other = store.clone();
        store.set_add("s", "x").await.unwrap();
        assert!(other.set_contains("s", "x").await.unwrap());
        assert_eq!(other.keys(), vec!["s".to_string()]);
    }
