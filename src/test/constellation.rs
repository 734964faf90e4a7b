use std::fs;

use crate::error::TopoError;
use crate::net::{NodeId, WorkerId};
use crate::sim::{ShellKind, ShellSpec};
use crate::topo::Constellation;

fn shell(orbits: usize, per_orbit: usize, phase_offset: u32, kind: ShellKind) -> ShellSpec {
    ShellSpec {
        name: None,
        orbits,
        sats_per_orbit: per_orbit,
        phase_offset,
        kind,
        inclination_deg: 53.0,
        altitude_km: 550.0,
        adjacency_file: None,
    }
}

fn has(pairs: &[(NodeId, NodeId)], a: usize, b: usize) -> bool {
    pairs.contains(&(NodeId(a.min(b)), NodeId(a.max(b))))
}

#[test]
fn delta_grid_wraps_seam_with_phase_offset() {
    let c = Constellation::new(0, NodeId(0), &shell(3, 4, 1, ShellKind::Delta));
    let pairs = c.grid_adjacency();
    assert_eq!(pairs.len(), 24);
    // 轨内环
    assert!(has(&pairs, 0, 1) && has(&pairs, 3, 0));
    // 相邻轨道同序号
    assert!(has(&pairs, 0, 4) && has(&pairs, 4, 8));
    // 接缝：轨道 2 的第 0 颗接到轨道 0 的第 1 颗
    assert!(has(&pairs, 8, 1));
    assert!(!has(&pairs, 8, 0));
}

#[test]
fn star_grid_has_no_seam_links() {
    let c = Constellation::new(0, NodeId(0), &shell(3, 4, 1, ShellKind::Star));
    let pairs = c.grid_adjacency();
    assert_eq!(pairs.len(), 20);
    assert!(!has(&pairs, 8, 1));
    assert!(!has(&pairs, 8, 0));
}

#[test]
fn shells_get_consecutive_id_ranges() {
    let shells = Constellation::from_specs(&[
        shell(2, 3, 0, ShellKind::Delta),
        shell(4, 2, 0, ShellKind::Delta),
    ]);
    assert_eq!(shells[0].first, NodeId(0));
    assert_eq!(shells[1].first, NodeId(6));
    assert_eq!(shells[1].name, "shell1");
    assert!(shells[1].contains(NodeId(13)));
    assert!(!shells[1].contains(NodeId(14)));
    assert_eq!(shells[1].grid_position(NodeId(9)), Some((1, 1)));
    assert!(
        shells[1]
            .grid_adjacency()
            .iter()
            .all(|(a, b)| shells[1].contains(*a) && shells[1].contains(*b))
    );
}

#[test]
fn adjacency_file_template_is_expanded_per_tick_and_worker() {
    let dir = std::env::temp_dir().join(format!("leosim-adj-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("adj_3_1.txt"), "0 5\n2 3\n").unwrap();
    fs::write(dir.join("adj_4_1.txt"), "0 9\n").unwrap();

    let mut spec = shell(2, 4, 0, ShellKind::Delta);
    spec.adjacency_file = Some(format!("{}/adj_{{tick}}_{{worker}}.txt", dir.display()));
    let c = Constellation::new(0, NodeId(0), &spec);

    let pairs = c.adjacency_at(3, Some(WorkerId(1))).unwrap();
    assert_eq!(pairs, vec![(NodeId(0), NodeId(5)), (NodeId(2), NodeId(3))]);

    let err = c.adjacency_at(4, Some(WorkerId(1))).unwrap_err();
    assert!(matches!(err, TopoError::Config(_)));

    let err = c.adjacency_at(5, Some(WorkerId(1))).unwrap_err();
    assert!(matches!(err, TopoError::MissingFile { .. }));
    let _ = fs::remove_dir_all(&dir);
}
