use std::time::Duration;

use anyhow::Result;
use chrono::{Local, TimeZone};

use catwatch::{Event, EventSink, Frame, SnapshotDir};

fn event_at(second: u32) -> Event {
    Event {
        timestamp: Local
            .with_ymd_and_hms(2024, 3, 9, 21, 15, second)
            .single()
            .expect("unambiguous local time"),
        at: Duration::from_millis(700),
        persisted: Duration::from_millis(700),
        frame: Frame::filled(32, 24, [200, 120, 40]).expect("valid frame"),
    }
}

#[test]
fn writes_timestamped_jpeg() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut sink = SnapshotDir::create(dir.path().join("nested/events"))?;

    let path = sink.persist(&event_at(7))?;
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("event_20240309-211507.jpg")
    );

    let decoded = image::open(&path)?.to_rgb8();
    assert_eq!(decoded.dimensions(), (32, 24));
    let px = decoded.get_pixel(16, 12).0;
    assert!((px[0] as i32 - 200).abs() < 12, "red channel drifted: {:?}", px);
    assert!((px[2] as i32 - 40).abs() < 12, "blue channel drifted: {:?}", px);
    Ok(())
}

#[test]
fn same_second_events_get_suffixes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut sink = SnapshotDir::create(dir.path())?;

    let names: Vec<String> = (0..3)
        .map(|_| {
            sink.persist(&event_at(30)).map(|path| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
        })
        .collect::<Result<_>>()?;

    assert_eq!(
        names,
        vec![
            "event_20240309-211530.jpg",
            "event_20240309-211530_2.jpg",
            "event_20240309-211530_3.jpg",
        ]
    );
    let leftovers = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
        .count();
    assert_eq!(leftovers, 0);
    Ok(())
}

#[test]
fn unwritable_dir_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file")?;
    assert!(SnapshotDir::create(&blocker).is_err());
    Ok(())
}
