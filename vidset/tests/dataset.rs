mod common;

use anyhow::Result;
use common::*;
use ndarray::{Array4, Axis};
use std::{
    path::{Path, PathBuf},
    sync::{atomic::Ordering, Arc},
};
use vidset::{
    sampler::Rejection,
    store::DatasetStore,
    text::TextEncoding,
    DatasetConfig, DatasetError, TextSample, Transform, VectorizeMode, VideoDataset, VideoShape,
};

fn config(cache_dir: &Path, depth: usize, step: usize) -> DatasetConfig {
    let shape = VideoShape {
        depth,
        height: 2,
        width: 3,
        channels: 3,
    };
    let mut config = DatasetConfig::new(cache_dir, shape, step);
    config.mode = VectorizeMode::Simple;
    config
}

fn table_path(dir: &Path) -> PathBuf {
    dir.join("msvd").join("text").join("train.tok.csv")
}

fn scenario_samples() -> Vec<TextSample> {
    vec![
        sample("clip1", "a man", "man plays guitar"),
        sample("clip2", "the dog", "dog runs fast in circles"),
        sample("clip3", "a cat", "cat sleeps"),
    ]
}

fn scenario_source() -> SyntheticSource {
    SyntheticSource::new([("clip1", 10, 7), ("clip2", 40, 40), ("clip3", 3, 3)])
}

#[tokio::test]
async fn short_and_truncated_clips_are_rejected() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let text = Arc::new(text_table(&table_path(tmp.path()), scenario_samples())?);
    let source = Arc::new(scenario_source());

    let dataset = VideoDataset::open(
        config(&tmp.path().join("cache"), 4, 1),
        text,
        source.clone(),
        None,
    )
    .await?;

    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.ids().collect::<Vec<_>>(), vec!["clip2"]);
    assert_eq!(dataset.index_of("clip1"), None);
    assert_eq!(dataset.index_of("clip3"), None);

    let report = dataset.report().unwrap();
    assert_eq!(report.accepted, vec!["clip2".to_string()]);
    assert_eq!(report.multipliers, vec![10]);
    assert_eq!(report.num_short(), 1);
    assert_eq!(report.num_corrupted(), 1);
    assert_eq!(
        report.rejected,
        vec![
            (
                "clip1".to_string(),
                Rejection::TruncatedDecode {
                    decoded: 7,
                    required: 8
                }
            ),
            (
                "clip3".to_string(),
                Rejection::ShortClip { native_count: 3 }
            ),
        ]
    );

    // frames 0, 10, 20 and 30 of the 40 frame clip are kept
    let sample = dataset.get(0)?;
    assert_eq!(sample.major.video.shape(), &[3, 4, 2, 3]);
    let kept: Vec<_> = sample
        .major
        .video
        .axis_iter(Axis(1))
        .map(|frame| (frame[[0, 0, 0]] * 255.0).round() as u32)
        .collect();
    assert_eq!(kept, vec![0, 10, 20, 30]);

    assert_eq!(source.open_now.load(Ordering::SeqCst), 0);
    assert_eq!(source.max_open.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn records_follow_table_order_and_label_arithmetic() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let samples = vec![
        sample("a", "a man", "man plays guitar"),
        sample("b", "the big dog", "dog runs"),
        sample("c", "cat", "cat sleeps on the sofa"),
    ];
    let text = Arc::new(text_table(&table_path(tmp.path()), samples.clone())?);
    let source = Arc::new(SyntheticSource::new([
        ("a", 8, 8),
        ("b", 17, 17),
        ("c", 64, 64),
    ]));

    let dataset = VideoDataset::open(
        config(&tmp.path().join("cache"), 8, 2),
        text.clone(),
        source,
        None,
    )
    .await?;
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.report().unwrap().multipliers, vec![1, 2, 8]);

    let packed = dataset.packed();
    assert_eq!(packed.major.labels.ncols(), 5);
    assert_eq!(packed.minor.actions.ncols(), 5);

    for (position, sample) in samples.iter().enumerate() {
        assert_eq!(dataset.index_of(&sample.id), Some(position));

        let record = dataset.get(position)?;
        let object_len = sample.object.len() as i64;
        let action_len = sample.action.len() as i64;
        assert_eq!(record.minor.action_len, action_len);
        assert_eq!(record.major.label_len, action_len + object_len - 1);
        assert_eq!(record.major.video.shape(), &[3, 4, 2, 3]);
        assert_eq!(record.major.label.len(), 5);
        assert!(record
            .major
            .label
            .iter()
            .skip(record.major.label_len as usize)
            .all(|&index| index == 0));
        assert_eq!(
            record.minor.object,
            TextEncoding::Sequence(
                sample
                    .object
                    .iter()
                    .map(|token| text_vocab_index(&text, token))
                    .collect()
            )
        );
    }
    Ok(())
}

fn text_vocab_index(text: &vidset::CsvTextTable, token: &str) -> i64 {
    use vidset::TextProcessor as _;
    text.vocabulary()[token]
}

#[tokio::test]
async fn cache_round_trip_and_idempotence() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let cache_dir = tmp.path().join("cache");
    let text = Arc::new(text_table(&table_path(tmp.path()), scenario_samples())?);
    let source = Arc::new(SyntheticSource::new([
        ("clip1", 10, 10),
        ("clip2", 40, 40),
        ("clip3", 3, 3),
    ]));

    let first = VideoDataset::open(
        config(&cache_dir, 4, 2),
        text.clone(),
        source.clone(),
        None,
    )
    .await?;
    assert!(first.report().is_some());
    assert_eq!(first.cache_path(), cache_dir.join("train.db"));
    let num_opened = source.num_opened.load(Ordering::SeqCst);
    assert_eq!(num_opened, 3);

    // the cache holds exactly the in-memory state
    let (_, loaded) = DatasetStore::new(first.cache_path()).load()?;
    assert_eq!(&loaded, first.packed());

    let second = VideoDataset::open(config(&cache_dir, 4, 2), text, source.clone(), None).await?;
    assert!(second.report().is_none());
    assert_eq!(source.num_opened.load(Ordering::SeqCst), num_opened);
    assert_eq!(second.len(), first.len());
    assert_eq!(second.packed(), first.packed());
    for index in 0..first.len() {
        assert_eq!(second.get(index)?, first.get(index)?);
    }
    assert_eq!(second.header(), first.header());
    Ok(())
}

#[tokio::test]
async fn lookup_by_ids() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let samples = vec![
        sample("a", "a man", "man plays guitar"),
        sample("b", "the dog", "dog runs"),
        sample("c", "cat", "cat sleeps"),
    ];
    let text = Arc::new(text_table(&table_path(tmp.path()), samples)?);
    let source = Arc::new(SyntheticSource::new([
        ("a", 4, 4),
        ("b", 9, 9),
        ("c", 13, 13),
    ]));
    let dataset =
        VideoDataset::open(config(&tmp.path().join("cache"), 4, 1), text, source, None).await?;

    for id in ["a", "b", "c"] {
        let position = dataset.index_of(id).unwrap();
        let sample = dataset.get(position)?;
        let (major, minor) = dataset.get_by_ids(&[id])?;

        assert_eq!(major.len(), 1);
        assert_eq!(major.labels.row(0), sample.major.label);
        assert_eq!(major.label_lens[0], sample.major.label_len);
        assert_eq!(major.videos.index_axis(Axis(0), 0), sample.major.video);
        assert_eq!(minor.objects[0], sample.minor.object);
        assert_eq!(minor.actions.row(0), sample.minor.action);
        assert_eq!(minor.action_lens[0], sample.minor.action_len);
    }

    let (major, minor) = dataset.get_by_ids(&["c", "a", "c"])?;
    assert_eq!(major.len(), 3);
    assert_eq!(minor.len(), 3);
    assert_eq!(major.label_lens.to_vec(), {
        let c = dataset.get(2)?.major.label_len;
        let a = dataset.get(0)?.major.label_len;
        vec![c, a, c]
    });

    let before = dataset.packed().clone();
    let err = dataset.get_by_ids(&["a", "missing"]).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DatasetError>(),
        Some(&DatasetError::UnknownId {
            id: "missing".into()
        })
    );
    assert_eq!(dataset.packed(), &before);

    let err = dataset.get(3).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DatasetError>(),
        Some(&DatasetError::IndexOutOfRange { index: 3, len: 3 })
    );
    Ok(())
}

#[tokio::test]
async fn transform_applies_to_positional_access() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let text = Arc::new(text_table(
        &table_path(tmp.path()),
        vec![sample("a", "a man", "man plays guitar")],
    )?);
    let source = Arc::new(SyntheticSource::new([("a", 4, 4)]));
    let transform: Transform = Arc::new(|video: Array4<f32>| video.mapv(|v| v * 2.0 - 1.0));

    let dataset = VideoDataset::open(
        config(&tmp.path().join("cache"), 4, 1),
        text,
        source,
        Some(transform),
    )
    .await?;

    let sample = dataset.get(0)?;
    assert_eq!(sample.major.video[[0, 0, 0, 0]], -1.0);

    let (major, _) = dataset.get_by_ids(&["a"])?;
    assert_eq!(major.videos[[0, 0, 0, 0, 0]], 0.0);
    Ok(())
}

#[tokio::test]
async fn missing_vocabulary_aborts_without_cache() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let cache_dir = tmp.path().join("cache");
    let samples = vec![
        sample("a", "a man", "man plays guitar"),
        sample("b", "the dog", "dog runs"),
    ];
    let mut vocabulary = vocabulary(&samples);
    vocabulary.remove("runs");
    let text = Arc::new(vidset::CsvTextTable::new(
        table_path(tmp.path()),
        samples,
        vocabulary,
    )?);
    let source = Arc::new(SyntheticSource::new([("a", 4, 4), ("b", 4, 4)]));

    let err = VideoDataset::open(config(&cache_dir, 4, 1), text, source, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<DatasetError>(),
        Some(&DatasetError::MissingVocabularyEntry {
            token: "runs".into()
        })
    );
    assert!(!cache_dir.join("train.db").exists());
    Ok(())
}

#[tokio::test]
async fn parallel_build_matches_serial_build() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let samples: Vec<_> = (0..12)
        .map(|index| sample(&format!("clip{}", index), "a man", "man plays guitar"))
        .collect();
    let text = Arc::new(text_table(&table_path(tmp.path()), samples)?);
    let clips: Vec<_> = (0..12)
        .map(|index| {
            let claimed = 3 + index * 5;
            let actual = if index % 4 == 1 { claimed - 1 } else { claimed };
            (format!("clip{}", index), claimed, actual)
        })
        .collect();
    let make_source = || {
        Arc::new(SyntheticSource::new(
            clips
                .iter()
                .map(|(id, claimed, actual)| (id.as_str(), *claimed, *actual)),
        ))
    };

    let serial_source = make_source();
    let serial = VideoDataset::open(
        config(&tmp.path().join("serial"), 4, 2),
        text.clone(),
        serial_source.clone(),
        None,
    )
    .await?;

    let parallel_source = make_source();
    let mut parallel_config = config(&tmp.path().join("parallel"), 4, 2);
    parallel_config.workers = std::num::NonZeroUsize::new(4);
    let parallel = VideoDataset::open(parallel_config, text, parallel_source.clone(), None).await?;

    assert_eq!(serial.packed(), parallel.packed());
    assert_eq!(serial.report(), parallel.report());
    assert_eq!(serial_source.max_open.load(Ordering::SeqCst), 1);
    assert!(parallel_source.max_open.load(Ordering::SeqCst) <= 4);
    assert_eq!(parallel_source.open_now.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_builder_is_locked_out() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let cache_dir = tmp.path().join("cache");
    let text = Arc::new(text_table(&table_path(tmp.path()), scenario_samples())?);

    let store = DatasetStore::new(cache_dir.join("train.db"));
    let _lock = store.lock()?;

    let err = VideoDataset::open(
        config(&cache_dir, 4, 1),
        text,
        Arc::new(scenario_source()),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::CacheLocked { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn undecodable_frame_rejects_only_its_clip() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let samples = vec![
        sample("bad", "a man", "man plays guitar"),
        sample("good", "the dog", "dog runs"),
    ];
    let text = Arc::new(text_table(&table_path(tmp.path()), samples)?);
    let source = Arc::new(SyntheticSource::new([("bad", 8, 8), ("good", 8, 8)]).fail_at("bad", 2));

    let dataset = VideoDataset::open(
        config(&tmp.path().join("cache"), 4, 1),
        text,
        source.clone(),
        None,
    )
    .await?;

    assert_eq!(dataset.ids().collect::<Vec<_>>(), vec!["good"]);
    let report = dataset.report().unwrap();
    assert_eq!(report.num_corrupted(), 1);
    assert_eq!(report.num_short(), 0);
    assert_eq!(
        report.rejected,
        vec![(
            "bad".to_string(),
            Rejection::TruncatedDecode {
                decoded: 2,
                required: 8
            }
        )]
    );
    assert!(dataset.cache_path().is_file());
    assert_eq!(source.open_now.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn missing_clip_counts_as_short() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let samples = vec![
        sample("present", "a man", "man plays guitar"),
        sample("absent", "the dog", "dog runs"),
    ];
    let text = Arc::new(text_table(&table_path(tmp.path()), samples)?);
    let source = Arc::new(SyntheticSource::new([("present", 4, 4)]));

    let dataset = VideoDataset::open(
        config(&tmp.path().join("cache"), 4, 1),
        text,
        source,
        None,
    )
    .await?;

    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.index_of("absent"), None);
    let report = dataset.report().unwrap();
    assert_eq!(report.num_short(), 1);
    assert_eq!(report.num_corrupted(), 0);
    assert_eq!(
        report.rejected,
        vec![(
            "absent".to_string(),
            Rejection::ShortClip { native_count: 0 }
        )]
    );
    Ok(())
}
