// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;

use person_finetune::dataset::{assemble, DatasetLayout, Split};
use person_finetune::utils::stems_in;
use person_finetune::{DatasetError, LabelRecord};

fn manual_layout(n: usize) -> (tempfile::TempDir, DatasetLayout) {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DatasetLayout::new(tmp.path().join("fine_tuning"));
    fs::create_dir_all(layout.images_manual()).unwrap();
    fs::create_dir_all(layout.labels_manual()).unwrap();
    for i in 0..n {
        fs::write(layout.images_manual().join(format!("m_{i:03}.jpg")), b"jpg").unwrap();
        fs::write(
            layout.labels_manual().join(format!("m_{i:03}.txt")),
            "0 0.500000 0.500000 0.100000 0.200000",
        )
        .unwrap();
    }
    (tmp, layout)
}

#[test]
fn test_fifty_manual_images() {
    let (_tmp, layout) = manual_layout(50);
    let dataset = assemble(&layout, 0.2, 42).unwrap();

    assert_eq!(dataset.val.copied, 10);
    assert_eq!(dataset.train.copied, 40);
    assert_eq!(dataset.train.unlabeled, 0);

    let train = stems_in(&layout.images(Split::Train), "jpg").unwrap();
    let val = stems_in(&layout.images(Split::Val), "jpg").unwrap();
    assert_eq!(train.len(), 40);
    assert_eq!(val.len(), 10);
    assert!(train.is_disjoint(&val));
    assert_eq!(stems_in(&layout.labels(Split::Val), "txt").unwrap(), val);
}

#[test]
fn test_pseudo_only_in_train_and_manual_label_wins() {
    let (_tmp, layout) = manual_layout(10);
    fs::create_dir_all(layout.images_pseudo()).unwrap();
    fs::create_dir_all(layout.labels_pseudo()).unwrap();
    for name in ["p_000", "p_001"] {
        fs::write(layout.images_pseudo().join(format!("{name}.png")), b"png").unwrap();
        fs::write(
            layout.labels_pseudo().join(format!("{name}.txt")),
            "0 0.100000 0.100000 0.050000 0.050000",
        )
        .unwrap();
    }
    // 同名的伪标签不能覆盖人工标签
    for i in 0..10 {
        fs::write(
            layout.labels_pseudo().join(format!("m_{i:03}.txt")),
            "0 0.900000 0.900000 0.050000 0.050000",
        )
        .unwrap();
    }

    let dataset = assemble(&layout, 0.2, 7).unwrap();
    assert_eq!(dataset.plan.pseudo_in_train, 2);
    assert_eq!(dataset.val.copied, 2);

    let val = stems_in(&layout.images(Split::Val), "png").unwrap();
    assert!(val.is_empty());
    assert!(layout.images(Split::Train).join("p_000.png").is_file());

    for dir in [layout.labels(Split::Train), layout.labels(Split::Val)] {
        for stem in stems_in(&dir, "txt").unwrap() {
            if !stem.starts_with("m_") {
                continue;
            }
            let record = LabelRecord::read(&dir.join(format!("{stem}.txt"))).unwrap();
            assert_eq!(record.boxes()[0].cx, 0.5);
        }
    }
}

#[test]
fn test_unlabeled_images_still_copied() {
    let (_tmp, layout) = manual_layout(4);
    fs::write(layout.images_manual().join("extra.jpg"), b"jpg").unwrap();

    let dataset = assemble(&layout, 0.2, 42).unwrap();
    assert_eq!(dataset.train.copied + dataset.val.copied, 5);
    assert_eq!(dataset.train.unlabeled + dataset.val.unlabeled, 1);
}

#[test]
fn test_data_yaml() {
    let (_tmp, layout) = manual_layout(3);
    let dataset = assemble(&layout, 0.2, 42).unwrap();
    let yaml = fs::read_to_string(&dataset.data_yaml).unwrap();
    let lines: Vec<&str> = yaml.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("train: ") && lines[0].ends_with("images/train"));
    assert!(lines[1].starts_with("val: ") && lines[1].ends_with("images/val"));
    assert_eq!(lines[2], "names: ['person']");
}

#[test]
fn test_no_manual_images_aborts_before_copying() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DatasetLayout::new(tmp.path());
    fs::create_dir_all(layout.images_pseudo()).unwrap();
    fs::write(layout.images_pseudo().join("p.jpg"), b"jpg").unwrap();

    let err = assemble(&layout, 0.2, 42).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DatasetError>(),
        Some(DatasetError::NoManualImages(_))
    ));
    assert!(!layout.root().join("images").exists());
    assert!(!layout.data_yaml().exists());
}

#[test]
fn test_pseudo_copy_never_replaces_manual_image() {
    let (_tmp, layout) = manual_layout(10);
    fs::create_dir_all(layout.images_pseudo()).unwrap();
    fs::create_dir_all(layout.labels_pseudo()).unwrap();
    for i in 0..10 {
        fs::write(layout.images_pseudo().join(format!("m_{i:03}.jpg")), b"pseudo").unwrap();
        fs::write(
            layout.labels_pseudo().join(format!("m_{i:03}.txt")),
            "0 0.900000 0.900000 0.050000 0.050000",
        )
        .unwrap();
    }

    let dataset = assemble(&layout, 0.2, 42).unwrap();
    assert_eq!(dataset.plan.pseudo_in_train, 0);
    assert_eq!(dataset.plan.train.len(), 8);
    assert_eq!(dataset.train.copied, 8);

    let stems: std::collections::HashSet<_> = dataset
        .plan
        .train
        .iter()
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(stems.len(), dataset.plan.train.len());

    let on_disk = stems_in(&layout.images(Split::Train), "jpg").unwrap();
    assert_eq!(on_disk.len(), 8);
    for stem in on_disk {
        let bytes = fs::read(layout.images(Split::Train).join(format!("{stem}.jpg"))).unwrap();
        assert_eq!(bytes, b"jpg");
    }
}
