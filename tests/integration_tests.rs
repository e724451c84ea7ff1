use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use bus_schedule::PipelineError;
use bus_schedule::config::Settings;
use bus_schedule::feed::FeedSource;
use bus_schedule::fetch::BasicClient;
use bus_schedule::output::{ROUTES_FILE, SCHEDULE_FILE, TRIPS_FILE, read_schedule};
use bus_schedule::pipeline;
use zip::write::FileOptions;

const CALENDAR: &str = "\
service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date
WKDY,1,1,1,1,1,0,0,20250106,20250110
SUN,0,0,0,0,0,0,1,20250105,20250112
";

const TRIPS: &str = "\
route_id,service_id,trip_id,trip_headsign,direction_id,shape_id
101,WKDY,T1,Teluk Bahang,0,SH101A
101,WKDY,T2,Teluk Bahang,0,SH101A
101,SUN,T3,Komtar,1,SH101B
302,GHOST,T4,Airport,0,SH302
";

const STOP_TIMES: &str = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
T1,24:10:00,24:10:00,KOMTAR,1
T1,24:30:00,24:30:00,BAHANG,2
T2,06:00:00,06:00:00,KOMTAR,1
T2,06:40:00,06:40:00,BAHANG,2
T3,07:15:00,07:15:00,BAHANG,1
T3,07:55:00,07:55:00,KOMTAR,2
T4,09:00:00,09:00:00,KOMTAR,1
ORPHAN,10:00:00,10:00:00,KOMTAR,1
";

const ROUTES: &str = "\
route_id,agency_id,route_short_name,route_long_name,route_type
101,rapidpg,101,Teluk Bahang - Komtar,3
302,rapidpg,302,Airport - Komtar,3
";

const STOPS: &str = "\
stop_id,stop_name,stop_lat,stop_lon
KOMTAR,Komtar,5.4145,100.3293
BAHANG,Teluk Bahang,5.4587,100.2165
";

fn zip_feed(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn settings(source: &FeedSource, output_dir: PathBuf) -> Settings {
    Settings {
        source: source.clone(),
        output_dir,
        timezone: chrono_tz::Asia::Kuala_Lumpur,
    }
}

/// Fresh working directory holding `feed.zip`.
fn workspace(name: &str, files: &[(&str, &str)]) -> (PathBuf, FeedSource) {
    let dir = std::env::temp_dir().join(format!("bus_schedule_it_{name}"));
    let _ = fs::remove_dir_all(&dir); // clean up any prior run
    fs::create_dir_all(&dir).unwrap();
    let feed_path = dir.join("feed.zip");
    fs::write(&feed_path, zip_feed(files)).unwrap();
    (dir, FeedSource::Path(feed_path))
}

fn full_feed() -> Vec<(&'static str, &'static str)> {
    vec![
        ("calendar.txt", CALENDAR),
        ("trips.txt", TRIPS),
        ("stop_times.txt", STOP_TIMES),
        ("routes.txt", ROUTES),
        ("stops.txt", STOPS),
    ]
}

#[tokio::test]
async fn test_full_pipeline() {
    let (dir, source) = workspace("full", &full_feed());
    let out = dir.join("data");
    let client = BasicClient::new().unwrap();

    let summary = pipeline::run(&settings(&source, out.clone()), &client).await.unwrap();

    assert_eq!(summary.trips, 4);
    assert_eq!(summary.services, 2);
    assert_eq!(summary.report.orphan_rows, 1);
    assert_eq!(summary.report.unknown_service_rows, 1);
    assert_eq!(summary.files.len(), 3);

    let schedule: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(SCHEDULE_FILE)).unwrap()).unwrap();
    let routes = schedule.as_array().unwrap();
    assert_eq!(routes.len(), 1, "route 302 has no known service");
    assert_eq!(routes[0]["route_id"], "101");

    let directions = routes[0]["directions"].as_array().unwrap();
    assert_eq!(directions.len(), 2);
    assert_eq!(directions[0]["direction_id"], 0);

    let weekdays = directions[0]["dates"].as_array().unwrap();
    assert_eq!(weekdays.len(), 5);
    assert_eq!(weekdays[0]["date"], "20250106");
    assert_eq!(weekdays[4]["date"], "20250110");
    assert_eq!(
        weekdays[0]["times"],
        serde_json::json!(["06:00:00", "24:10:00"])
    );

    let sundays = directions[1]["dates"].as_array().unwrap();
    let sunday_dates: Vec<&str> = sundays.iter().map(|d| d["date"].as_str().unwrap()).collect();
    assert_eq!(sunday_dates, vec!["20250105", "20250112"]);

    let trips: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(TRIPS_FILE)).unwrap()).unwrap();
    assert_eq!(trips.as_array().unwrap().len(), 4);
    assert_eq!(trips[2]["direction_id"], 1);
    assert_eq!(trips[2]["shape_id"], "SH101B");

    let directory: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(ROUTES_FILE)).unwrap()).unwrap();
    assert_eq!(directory[0]["route_short_name"], "101");
    assert_eq!(directory[0]["directions"][0]["route_long_name"], "Teluk Bahang");
    assert_eq!(directory[0]["directions"][0]["stops"][1]["stop_name"], "Teluk Bahang");

    assert!(!out.join(".schedule.lock").exists());
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let (dir, source) = workspace("idempotent", &full_feed());
    let client = BasicClient::new().unwrap();

    let first_out = dir.join("first");
    let second_out = dir.join("second");
    pipeline::run(&settings(&source, first_out.clone()), &client).await.unwrap();
    pipeline::run(&settings(&source, second_out.clone()), &client).await.unwrap();

    for file in [TRIPS_FILE, SCHEDULE_FILE, ROUTES_FILE] {
        let a = fs::read(first_out.join(file)).unwrap();
        let b = fs::read(second_out.join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between runs");
    }

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_schedule_reads_back_for_next_departure() {
    let (dir, source) = workspace("read_back", &full_feed());
    let out = dir.join("data");
    let client = BasicClient::new().unwrap();
    pipeline::run(&settings(&source, out.clone()), &client).await.unwrap();

    let schedule = read_schedule(&out.join(SCHEDULE_FILE)).unwrap();
    let date = "20250107".parse().unwrap();
    let times = schedule
        .lookup("101", bus_schedule::model::Direction::Zero, date)
        .unwrap();
    let next = bus_schedule::clock::next_departure(times, 7 * 3600).unwrap();
    assert_eq!(next.as_str(), "24:10:00");

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_missing_calendar_aborts_without_output() {
    let (dir, source) = workspace(
        "missing",
        &[("trips.txt", TRIPS), ("stop_times.txt", STOP_TIMES)],
    );
    let out = dir.join("data");
    let client = BasicClient::new().unwrap();

    match pipeline::run(&settings(&source, out.clone()), &client).await {
        Err(PipelineError::MissingResource(name)) => assert_eq!(name, "calendar"),
        other => panic!("expected MissingResource, got {other:?}"),
    }
    assert!(!out.join(SCHEDULE_FILE).exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_route_directory_is_optional() {
    let (dir, source) = workspace(
        "no_routes",
        &[
            ("gtfs/calendar.txt", CALENDAR),
            ("gtfs/trips.txt", TRIPS),
            ("gtfs/stop_times.txt", STOP_TIMES),
        ],
    );
    let out = dir.join("data");
    let client = BasicClient::new().unwrap();

    let summary = pipeline::run(&settings(&source, out.clone()), &client).await.unwrap();
    assert_eq!(summary.files.len(), 2);
    assert!(out.join(SCHEDULE_FILE).exists());
    assert!(!out.join(ROUTES_FILE).exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_bad_calendar_date_is_fatal() {
    let calendar = "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
                    WKDY,1,1,1,1,1,0,0,2025-01-06,20250110\n";
    let (dir, source) = workspace(
        "bad_date",
        &[
            ("calendar.txt", calendar),
            ("trips.txt", TRIPS),
            ("stop_times.txt", STOP_TIMES),
        ],
    );
    let client = BasicClient::new().unwrap();

    match pipeline::run(&settings(&source, dir.join("data")), &client).await {
        Err(PipelineError::InvalidDateFormat { service_id, field, .. }) => {
            assert_eq!(service_id, "WKDY");
            assert_eq!(field, "start_date");
        }
        other => panic!("expected InvalidDateFormat, got {other:?}"),
    }

    fs::remove_dir_all(&dir).unwrap();
}
