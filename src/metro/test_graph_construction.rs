// Copyright: Metro Conquest organisers
// Removal of the attribution is not allowed

use super::*;
use crate::feed::stub::StubFeed;
use crate::feed::{LocalizedName, StationPosition, StationRecord};
use crate::store::MemoryGameStore;
use serde_json::{Value, json};

const LOCATIONS_A: &str = "https://example.test/locations/a";
const LOCATIONS_B: &str = "https://example.test/locations/b";
const LINES_A: &str = "https://example.test/lines/a";
const LINES_B: &str = "https://example.test/lines/b";

fn config(deleted: &[&str]) -> GameConfig {
    let mut config = GameConfig {
        delete_stations: deleted.iter().map(|s| s.to_string()).collect(),
        special_probability: 0.0,
        hidden_probability: 0.0,
        seed: Some(42),
        ..Default::default()
    };
    config.sources.location_urls = vec![LOCATIONS_A.to_string(), LOCATIONS_B.to_string()];
    config.sources.line_urls = vec![LINES_A.to_string(), LINES_B.to_string()];
    config
}

fn station(id: &str, name: &str) -> StationRecord {
    StationRecord {
        sequence: 0,
        station_id: id.to_string(),
        station_name: LocalizedName {
            zh_tw: name.to_string(),
            en: name.to_string(),
        },
        cumulative_distance: 0.0,
    }
}

fn line(line_id: &str, stations: &[(&str, &str)]) -> LineRecord {
    LineRecord {
        line_no: line_id.to_string(),
        line_id: line_id.to_string(),
        stations: stations
            .iter()
            .enumerate()
            .map(|(i, (id, name))| StationRecord {
                sequence: i as i32 + 1,
                ..station(id, name)
            })
            .collect(),
    }
}

fn lines_json(lines: &[LineRecord]) -> Value {
    serde_json::to_value(lines).unwrap()
}

fn locations_json(entries: &[(&str, &str)]) -> Value {
    let records: Vec<LocationRecord> = entries
        .iter()
        .map(|(name, geohash)| LocationRecord {
            station_id: String::new(),
            station_name: LocalizedName {
                zh_tw: name.to_string(),
                en: String::new(),
            },
            station_position: StationPosition {
                position_lon: 121.5,
                position_lat: 25.0,
                geo_hash: geohash.to_string(),
            },
        })
        .collect();
    serde_json::to_value(records).unwrap()
}

fn neighbours(metro: &MetroSystem, name: &str) -> Vec<String> {
    metro
        .reachable(name)
        .unwrap_or_else(|| panic!("{} missing from graph", name))
        .iter()
        .cloned()
        .collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Remote sources answer with the given line set; locations come back empty
/// so nothing falls back.
fn feed_with_lines(lines: &[LineRecord]) -> StubFeed {
    StubFeed::default()
        .with(LOCATIONS_A, locations_json(&[("A", "wsqqm")]))
        .with(LINES_A, lines_json(lines))
        .with(LINES_B, json!([]))
}

#[tokio::test]
async fn test_deleted_middle_station_scenario() {
    let lines = vec![line("L", &[("L01", "A"), ("L02", "B"), ("L03", "C")])];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&["B"]), &mut local, &feed)
        .await
        .unwrap();

    assert_eq!(metro.graph.len(), 2);
    assert!(neighbours(&metro, "A").is_empty());
    assert!(neighbours(&metro, "C").is_empty());
    assert!(metro.find_station("B").is_none());
    assert!(metro.reachable("B").is_none());
    assert!(metro.is_loaded());
}

#[tokio::test]
async fn test_interior_edges_are_symmetric() {
    let lines = vec![line(
        "BL",
        &[
            ("BL01", "頂埔"),
            ("BL02", "永寧"),
            ("BL03", "土城"),
            ("BL04", "海山"),
            ("BL05", "亞東醫院"),
        ],
    )];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed)
        .await
        .unwrap();

    for pair in lines[0].stations.windows(2) {
        let a = &pair[0].station_name.zh_tw;
        let b = &pair[1].station_name.zh_tw;
        assert!(metro.reachable(a).unwrap().contains(b), "{} -> {}", a, b);
        assert!(metro.reachable(b).unwrap().contains(a), "{} -> {}", b, a);
    }
    assert_eq!(neighbours(&metro, "頂埔"), names(&["永寧"]));
}

#[tokio::test]
async fn test_branch_links_to_base_both_ways() {
    let lines = vec![line(
        "BL",
        &[
            ("BL03", "土城"),
            ("BL04", "海山"),
            ("BL05", "亞東醫院"),
            ("BL04A", "海山支線"),
        ],
    )];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed)
        .await
        .unwrap();

    assert!(metro.reachable("海山支線").unwrap().contains("海山"));
    assert!(metro.reachable("海山").unwrap().contains("海山支線"));
    // the branch only links to its base
    assert_eq!(neighbours(&metro, "海山支線"), names(&["海山"]));
    // the last trunk station still picks up the branch listed after it, one way
    assert!(metro.reachable("亞東醫院").unwrap().contains("海山支線"));
}

#[tokio::test]
async fn test_branch_with_deleted_base_is_isolated() {
    let lines = vec![line(
        "G",
        &[("G02", "萬隆"), ("G03", "七張"), ("G04", "大坪林"), ("G03A", "小碧潭")],
    )];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&["七張"]), &mut local, &feed)
        .await
        .unwrap();

    assert!(metro.reachable("七張").is_none());
    assert!(neighbours(&metro, "萬隆").is_empty());
    // 大坪林 is the last trunk entry before the branch record
    assert_eq!(neighbours(&metro, "大坪林"), names(&["小碧潭"]));
    assert!(neighbours(&metro, "小碧潭").is_empty());
}

#[tokio::test]
async fn test_branch_without_base_fails_build() {
    let lines = vec![line("G", &[("G02", "萬隆"), ("G03A", "小碧潭")])];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let result = MetroSystem::build(&config(&[]), &mut local, &feed).await;

    match result {
        Err(BuildError::MissingBranchBase { line, station_id }) => {
            assert_eq!(line, "G");
            assert_eq!(station_id, "G03A");
        }
        other => panic!("expected missing base, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_empty_line_fails_build() {
    let lines = vec![line("V", &[])];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let result = MetroSystem::build(&config(&[]), &mut local, &feed).await;

    assert!(matches!(result, Err(BuildError::EmptyLine { .. })));
}

#[tokio::test]
async fn test_pruning_removes_every_trace() {
    let lines = vec![
        line(
            "R",
            &[("R21", "奇岩"), ("R22", "北投"), ("R23", "復興崗"), ("R22A", "新北投")],
        ),
        line("O", &[("O01", "南勢角"), ("O02", "景安"), ("O03", "永安市場")]),
    ];
    let deleted = ["新北投", "景安"];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&deleted), &mut local, &feed)
        .await
        .unwrap();

    for name in deleted {
        assert!(!metro.graph.contains_key(name));
        assert!(metro.find_station(name).is_none());
        for neighbours in metro.graph.values() {
            assert!(!neighbours.contains(name));
        }
    }
}

#[tokio::test]
async fn test_lookup_matches_graph_keys() {
    let lines = vec![
        line("BL", &[("BL11", "西門"), ("BL12", "台北車站"), ("BL13", "善導寺")]),
        line("R", &[("R09", "中正紀念堂"), ("R10", "台大醫院"), ("R11", "台北車站")]),
    ];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&["善導寺"]), &mut local, &feed)
        .await
        .unwrap();

    for name in metro.graph.keys() {
        assert!(metro.find_station(name).is_some(), "{} has no station", name);
    }
    assert_eq!(metro.station_count(), metro.graph.len());
    assert!(metro.find_station("淡水").is_none());
    // transfer stations merge neighbours from every line
    assert_eq!(neighbours(&metro, "台北車站"), names(&["台大醫院", "西門"]));
}

#[tokio::test]
async fn test_special_and_prison_imply_hidden() {
    let lines = vec![line(
        "BL",
        &[
            ("BL01", "頂埔"),
            ("BL02", "永寧"),
            ("BL03", "土城"),
            ("BL04", "海山"),
            ("BL05", "亞東醫院"),
            ("BL06", "府中"),
        ],
    )];
    let feed = feed_with_lines(&lines);
    let mut local = LocalData::default();
    local.station_info.insert(
        "土城".to_string(),
        MissionInfo {
            mission: "監獄".to_string(),
            exit: "1".to_string(),
            difficult: 0,
            tips: "無".to_string(),
        },
    );
    let config = GameConfig {
        special_probability: 0.5,
        hidden_probability: 0.2,
        ..config(&[])
    };

    let metro = MetroSystem::build(&config, &mut local, &feed)
        .await
        .unwrap();

    assert!(metro.find_station("土城").unwrap().is_prison);
    for station in metro.stations() {
        if station.is_prison || station.is_special {
            assert!(station.hidden, "{} should be hidden", station);
        }
    }
}

#[tokio::test]
async fn test_seeded_build_is_reproducible() {
    let lines = vec![line(
        "BL",
        &[("BL01", "頂埔"), ("BL02", "永寧"), ("BL03", "土城"), ("BL04", "海山")],
    )];
    let config = GameConfig {
        special_probability: 0.5,
        hidden_probability: 0.5,
        ..config(&[])
    };

    let mut first_local = LocalData::default();
    let first = MetroSystem::build(&config, &mut first_local, &feed_with_lines(&lines))
        .await
        .unwrap();
    let mut second_local = LocalData::default();
    let second = MetroSystem::build(&config, &mut second_local, &feed_with_lines(&lines))
        .await
        .unwrap();

    for station in first.stations() {
        assert_eq!(Some(station), second.find_station(&station.name));
    }
}

#[tokio::test]
async fn test_mission_sheet_and_defaults_are_merged() {
    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧")])];
    let feed = StubFeed::default()
        .with(LOCATIONS_A, locations_json(&[("頂埔", "wsqmd")]))
        .with(LINES_A, lines_json(&lines))
        .with(LINES_B, json!([]));
    let mut local = LocalData::default();
    local.station_info.insert(
        "頂埔".to_string(),
        MissionInfo {
            mission: "Find the mural".to_string(),
            exit: "3".to_string(),
            difficult: 2,
            tips: "Look left".to_string(),
        },
    );

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed)
        .await
        .unwrap();

    let dingpu = metro.find_station("頂埔").unwrap();
    assert_eq!(dingpu.mission, "Find the mural");
    assert_eq!(dingpu.point, 20);
    assert_eq!(dingpu.geohash.as_deref(), Some("wsqmd"));

    let yongning = metro.find_station("永寧").unwrap();
    assert_eq!(yongning.mission, "無");
    assert_eq!(yongning.exit, "不限");
    assert_eq!(yongning.difficult, 0);
    assert_eq!(yongning.geohash, None);
}

#[tokio::test]
async fn test_rate_limited_locations_fall_back() {
    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧")])];
    let feed = StubFeed::default()
        .with(LOCATIONS_A, json!({"message": "rate limited"}))
        .with(LINES_A, lines_json(&lines))
        .with(LINES_B, json!([]));
    let fallback = locations_json(&[("頂埔", "wsqmd"), ("永寧", "wsqme")]);
    let mut local = LocalData::new(
        Default::default(),
        None,
        Some(serde_json::from_value(fallback).unwrap()),
    );

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed)
        .await
        .unwrap();

    assert_eq!(metro.station_location.len(), 2);
    assert_eq!(
        metro.find_station("永寧").unwrap().geohash.as_deref(),
        Some("wsqme")
    );
    // the fallback filled the mapping, the second source is never asked
    assert!(!feed.requested.borrow().contains(&LOCATIONS_B.to_string()));
}

#[tokio::test]
async fn test_unreachable_lines_use_fallback_once() {
    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧")])];
    // no line documents at all: both line urls fail
    let feed = StubFeed::default().with(LOCATIONS_A, locations_json(&[("頂埔", "wsqmd")]));
    let mut local = LocalData::new(Default::default(), Some(lines.clone()), None);

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed)
        .await
        .unwrap();

    assert_eq!(metro.station_count(), 2);
    assert_eq!(neighbours(&metro, "頂埔"), names(&["永寧"]));
    assert!(!feed.requested.borrow().contains(&LINES_B.to_string()));
}

#[tokio::test]
async fn test_missing_fallback_is_fatal() {
    let feed = StubFeed::default();
    let mut local = LocalData::default();

    let result = MetroSystem::build(&config(&[]), &mut local, &feed).await;

    assert!(matches!(
        result,
        Err(BuildError::NoFallback {
            dataset: "station location"
        })
    ));
}

#[tokio::test]
async fn test_save_twice_keeps_one_row_per_station() {
    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧"), ("BL03", "土城")])];
    let mut local = LocalData::default();
    let mut metro = MetroSystem::build(&config(&[]), &mut local, &feed_with_lines(&lines))
        .await
        .unwrap();
    metro.find_station_mut("永寧").unwrap().team = Some("red".to_string());
    let store = MemoryGameStore::default();

    metro.save_stations(&store).await.unwrap();
    let first = store.load_stations().await.unwrap();
    metro.save_stations(&store).await.unwrap();
    let second = store.load_stations().await.unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_load_skips_stale_rows() {
    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧")])];
    let mut local = LocalData::default();
    let mut metro = MetroSystem::build(&config(&[]), &mut local, &feed_with_lines(&lines))
        .await
        .unwrap();
    let store = MemoryGameStore::default();
    store
        .upsert_stations(&[
            StationRow {
                name: "永寧".to_string(),
                is_special: true,
                hidden: true,
                owner_team: Some("blue".to_string()),
            },
            StationRow {
                name: "已拆除".to_string(),
                is_special: false,
                hidden: false,
                owner_team: Some("red".to_string()),
            },
        ])
        .await
        .unwrap();

    let restored = metro.load_stations(&store).await.unwrap();

    assert_eq!(restored, 1);
    let yongning = metro.find_station("永寧").unwrap();
    assert_eq!(yongning.team.as_deref(), Some("blue"));
    assert!(yongning.is_special);
    assert!(yongning.hidden);
    assert!(metro.find_station("已拆除").is_none());
}

#[tokio::test]
async fn test_graph_snapshot_lists_neighbours() {
    let lines = vec![line("L", &[("L01", "A"), ("L02", "B"), ("L03", "C")])];
    let mut local = LocalData::default();
    let metro = MetroSystem::build(&config(&[]), &mut local, &feed_with_lines(&lines))
        .await
        .unwrap();

    let snapshot: Value = serde_json::from_str(&metro.graph_snapshot().unwrap()).unwrap();

    assert_eq!(
        snapshot,
        json!({"A": ["B"], "B": ["A", "C"], "C": ["B"]})
    );
}

/// Pins the adjacency produced from the shipped fallback dataset, line ends
/// and branch junctions included.
#[tokio::test]
async fn test_shipped_fallback_adjacency() {
    let data_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    let mut local = LocalData::load_from_dir(&data_dir).unwrap();
    let config = GameConfig {
        seed: Some(7),
        ..GameConfig::from_path(&data_dir.join("game_config.json")).unwrap()
    };

    let metro = MetroSystem::build(&config, &mut local, &StubFeed::default())
        .await
        .unwrap();

    let expected: Graph = serde_json::from_str(
        &std::fs::read_to_string(data_dir.join("expected_graph.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(metro.graph, expected);

    for station in &config.delete_stations {
        assert!(metro.find_station(station).is_none());
    }
}

#[tokio::test]
async fn test_transfer_station_keeps_last_record() {
    let lines = vec![
        line("BL", &[("BL11", "西門"), ("BL12", "台北車站"), ("BL13", "善導寺")]),
        line("R", &[("R10", "台大醫院"), ("R11", "台北車站"), ("R12", "中山")]),
    ];
    let mut local = LocalData::default();

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed_with_lines(&lines))
        .await
        .unwrap();

    let main_station = metro.find_station("台北車站").unwrap();
    assert_eq!(main_station.id, "R11");
    assert_eq!(main_station.sequence, 2);
    assert_eq!(metro.station_count(), 5);
    assert_eq!(
        neighbours(&metro, "台北車站"),
        names(&["中山", "台大醫院", "善導寺", "西門"])
    );
}

#[tokio::test]
async fn test_refused_line_source_uses_fallback() {
    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧")])];
    let feed = StubFeed::default()
        .with(LOCATIONS_A, locations_json(&[("頂埔", "wsqmd")]))
        .with(LINES_A, json!({"message": "API rate limit exceeded"}))
        .with(LINES_B, lines_json(&[line("Y", &[("Y07", "大坪林"), ("Y08", "十四張")])]));
    let mut local = LocalData::new(Default::default(), Some(lines), None);

    let metro = MetroSystem::build(&config(&[]), &mut local, &feed)
        .await
        .unwrap();

    assert_eq!(neighbours(&metro, "頂埔"), names(&["永寧"]));
    assert!(metro.find_station("大坪林").is_none());
    assert!(!feed.requested.borrow().contains(&LINES_B.to_string()));
}

#[tokio::test]
async fn test_build_caches_remote_data() {
    let dir = std::env::temp_dir().join("metroquest_build_caches_remote_data");
    std::fs::create_dir_all(&dir).unwrap();
    let _ = std::fs::remove_file(dir.join(crate::local_data::LINES_FALLBACK_FILE));
    let _ = std::fs::remove_file(dir.join(crate::local_data::LOCATIONS_FALLBACK_FILE));

    let lines = vec![line("BL", &[("BL01", "頂埔"), ("BL02", "永寧")])];
    let feed = StubFeed::default()
        .with(LOCATIONS_A, locations_json(&[("頂埔", "wsqmd"), ("永寧", "wsqme")]))
        .with(LINES_A, lines_json(&lines))
        .with(LINES_B, lines_json(&[line("Y", &[("Y07", "大坪林"), ("Y08", "十四張")])]));
    let mut config = config(&[]);
    config.sources.cache_remote_data = true;
    let mut local = LocalData::load_from_dir(&dir).unwrap();

    let metro = MetroSystem::build(&config, &mut local, &feed)
        .await
        .unwrap();
    assert_eq!(metro.station_count(), 4);

    let cached = LocalData::load_from_dir(&dir).unwrap();
    let cached_lines: Vec<String> = cached
        .fallback_lines
        .unwrap()
        .into_iter()
        .map(|line| line.line_id)
        .collect();
    assert_eq!(cached_lines, vec!["BL".to_string(), "Y".to_string()]);
    assert_eq!(cached.fallback_locations.unwrap().len(), 2);
}
