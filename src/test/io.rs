use std::fs;

use crate::error::TopoError;
use crate::net::{NodeId, OutageCauses};
use crate::topo::{
    ChangeReason, ContactEntry, LineSink, change_line, parse_adjacency, parse_contact_log,
    read_adjacency_file, read_coalition_file, write_lookahead,
};
use crate::sim::SimTime;

#[test]
fn adjacency_lines_skip_blanks_and_comments() {
    let raw = "# tick 0\n0 1\n\n  2   3  \n";
    let pairs = parse_adjacency("adj", raw).unwrap();
    assert_eq!(pairs, vec![(NodeId(0), NodeId(1)), (NodeId(2), NodeId(3))]);
}

#[test]
fn malformed_adjacency_line_names_file_and_line() {
    let err = parse_adjacency("adj.txt", "0 1\n0 1 2\n").unwrap_err();
    match err {
        TopoError::Config(msg) => assert!(msg.starts_with("adj.txt:2"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(parse_adjacency("adj.txt", "0 x\n").is_err());
}

#[test]
fn contact_log_round_trips_through_its_line_format() {
    let entries = parse_contact_log("contacts", "0,66,5\n1000, 67 ,9\n").unwrap();
    assert_eq!(
        entries[1],
        ContactEntry {
            time_ms: 1000,
            station: NodeId(67),
            satellite: NodeId(9)
        }
    );
    assert_eq!(entries[0].to_line(), "0,66,5");
    assert!(parse_contact_log("contacts", "0,66\n").is_err());
}

#[test]
fn missing_adjacency_file_is_missing_file_error() {
    let err = read_adjacency_file("/nonexistent/leosim/adj_0.txt".as_ref()).unwrap_err();
    assert!(matches!(err, TopoError::MissingFile { .. }));
}

#[test]
fn coalition_file_must_be_array_of_arrays() {
    let dir = std::env::temp_dir().join(format!("leosim-coalition-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let good = dir.join("good.json");
    fs::write(&good, "[[0, 2], [1]]").unwrap();
    assert_eq!(read_coalition_file(&good).unwrap(), vec![vec![0, 2], vec![1]]);

    let bad = dir.join("bad.json");
    fs::write(&bad, "{\"0\": [0]}").unwrap();
    assert!(matches!(read_coalition_file(&bad), Err(TopoError::Config(_))));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn change_lines_use_millis_and_optional_reason() {
    let t = SimTime::from_millis(1_500);
    assert_eq!(change_line(t, NodeId(70), NodeId(5), None), "1500,70,5");
    assert_eq!(
        change_line(t, NodeId(70), NodeId(5), Some(ChangeReason::GslDetach)),
        "1500,70,5,gsl_detach"
    );
    let causes = OutageCauses {
        polar: true,
        sun: true,
        random: false,
    };
    assert_eq!(
        change_line(t, NodeId(1), NodeId(2), Some(ChangeReason::IslDown(causes))),
        "1500,1,2,isl_down:polar+sun"
    );
}

#[test]
fn line_sink_writes_file_and_lookahead_overwrites() {
    let dir = std::env::temp_dir().join(format!("leosim-sink-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("log.csv");
    let mut sink = LineSink::create(&path).unwrap();
    sink.push("0,1,2".into()).unwrap();
    sink.push("0,3,4".into()).unwrap();
    sink.flush().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "0,1,2\n0,3,4\n");
    assert_eq!(sink.lines().len(), 2);

    let la = dir.join("lookahead.txt");
    write_lookahead(&la, SimTime(2_000_000)).unwrap();
    write_lookahead(&la, SimTime(1_834_000)).unwrap();
    assert_eq!(fs::read_to_string(&la).unwrap().trim(), "1834000");
    let _ = fs::remove_dir_all(&dir);
}
