use sdpick::correction::correct_line;
use sdpick::export::{survey_points, write_points, ExportMode};
use sdpick::model::{PickKey, PickSample, PickType, Position, Source, Trace};
use sdpick::picks::PickLineManager;
use sdpick::project::Project;
use sdpick::store::{SurveyLine, TraceStore};
use sdpick::tide::TideCurve;
use time::OffsetDateTime;

fn at(secs: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(secs).unwrap()
}

fn line(name: &str, timestamps: &[i64]) -> SurveyLine {
    let traces = timestamps
        .iter()
        .enumerate()
        .map(|(i, t)| Trace {
            line: name.to_string(),
            index: i,
            timestamp: at(*t),
            frequency: 200,
            position: Position {
                x: i as f64,
                y: 0.0,
            },
            draft: 0.0,
            heave: 0.0,
            resolution: 0.1,
            amplitudes: vec![0.0; 8],
        })
        .collect();
    SurveyLine::new(name, traces).unwrap()
}

fn tide() -> TideCurve {
    TideCurve::new(vec![(at(0), 100.0), (at(10), 102.0)]).unwrap()
}

fn export(store: &TraceStore, manager: &PickLineManager, mode: ExportMode) -> String {
    let points = survey_points(store, manager, &tide()).unwrap();
    let mut out = Vec::new();
    write_points(&mut out, &points, mode, b',').unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn tide_corrected_bottom_with_empty_pre_columns() {
    let store = TraceStore::from_lines([line("L1", &[0, 2, 4, 6, 8])]);
    let mut manager = PickLineManager::for_store(&store);
    let bottom = PickKey::new("L1", PickType::Bottom);
    manager
        .set_range(&bottom, 0..5, &[Some(20.0); 5], Source::Manual)
        .unwrap();

    let corrected = correct_line(
        store.line("L1").unwrap(),
        manager.get(&bottom).unwrap(),
        None,
        &tide(),
    )
    .unwrap();
    for (c, expected) in corrected.iter().zip([80.0, 80.4, 80.8, 81.2, 81.6]) {
        assert!((c.bottom_elevation.unwrap() - expected).abs() < 1e-9);
        assert_eq!(c.pre_impoundment_elevation, None);
        assert_eq!(c.thickness, None);
    }

    assert_eq!(
        export(&store, &manager, ExportMode::Full),
        "x,y,bottom_elevation,pre_impoundment_elevation,sediment_thickness\n\
         0.000,0.000,80.000,,\n\
         1.000,0.000,80.400,,\n\
         2.000,0.000,80.800,,\n\
         3.000,0.000,81.200,,\n\
         4.000,0.000,81.600,,\n"
    );
}

#[test]
fn interpolation_respects_max_gap() {
    let store = TraceStore::from_lines([line("L1", &[0, 1, 2, 3, 4])]);
    let key = PickKey::new("L1", PickType::Bottom);
    let picks = [Some(10.0), None, None, None, Some(14.0)];

    let mut manager = PickLineManager::for_store(&store);
    manager.merge_auto(&key, &picks.map(|d| PickSample::auto(d, None))).unwrap();
    assert_eq!(manager.interpolate_gaps(&key, 2).unwrap(), 0);
    assert_eq!(manager.depths("L1", PickType::Bottom).unwrap(), picks.to_vec());

    assert_eq!(manager.interpolate_gaps(&key, 5).unwrap(), 3);
    let filled = manager.get(&key).unwrap();
    for (i, depth) in [11.0, 12.0, 13.0].into_iter().enumerate() {
        assert_eq!(filled.get(i + 1), Some(&PickSample::interpolated(depth)));
    }
}

#[test]
fn no_pre_export_omits_columns() {
    let store = TraceStore::from_lines([line("L1", &[0, 5]), line("L0", &[10])]);
    let mut manager = PickLineManager::for_store(&store);
    for name in ["L0", "L1"] {
        let len = manager.trace_count(name).unwrap();
        manager
            .set_range(&PickKey::new(name, PickType::Bottom), 0..len, &vec![Some(2.0); len], Source::Manual)
            .unwrap();
        manager
            .set_range(
                &PickKey::new(name, PickType::PreImpoundment),
                0..len,
                &vec![Some(5.0); len],
                Source::Manual,
            )
            .unwrap();
    }

    let full = export(&store, &manager, ExportMode::Full);
    assert_eq!(full.lines().nth(1), Some("0.000,0.000,100.000,97.000,3.000"));

    let no_pre = export(&store, &manager, ExportMode::NoPre);
    assert_eq!(
        no_pre,
        "x,y,bottom_elevation\n0.000,0.000,100.000\n0.000,0.000,98.000\n1.000,0.000,99.000\n"
    );
}

#[test]
fn points_skip_unpicked_bottom() {
    let store = TraceStore::from_lines([line("L1", &[0, 1, 2, 20])]);
    let mut manager = PickLineManager::for_store(&store);
    let key = PickKey::new("L1", PickType::Bottom);
    manager
        .set_range(&key, 0..4, &[Some(1.0), None, Some(1.0), Some(1.0)], Source::Manual)
        .unwrap();

    let points = survey_points(&store, &manager, &tide()).unwrap();
    let indices: Vec<usize> = points.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 2, 3]);
    assert_eq!(points[2].bottom_elevation, None);
}

#[test]
fn project_round_trip_keeps_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let store = TraceStore::from_lines([line("L1", &[0, 1, 2, 3])]);
    let key = PickKey::new("L1", PickType::Horizon(1));

    let mut manager = PickLineManager::for_store(&store);
    manager
        .merge_auto(
            &key,
            &[
                PickSample::auto(Some(3.0), Some(0.25)),
                PickSample::auto(None, None),
                PickSample::auto(Some(3.5), Some(1.0)),
                PickSample::auto(Some(9.0), Some(0.5)),
            ],
        )
        .unwrap();
    manager.interpolate_gaps(&key, 1).unwrap();
    manager.set_range(&key, 3..4, &[None], Source::Manual).unwrap();

    let project = Project::new(dir.path());
    project.save_picks(&manager).unwrap();
    project.save_tide(&tide()).unwrap();

    let mut reopened = PickLineManager::for_store(&store);
    project.load_picks(&mut reopened).unwrap();
    assert_eq!(reopened.get(&key), manager.get(&key));
    let sources: Vec<Source> = reopened.get(&key).unwrap().samples().iter().map(|s| s.source).collect();
    assert_eq!(
        sources,
        vec![Source::Auto, Source::Interpolated, Source::Auto, Source::Manual]
    );
    assert_eq!(project.load_tide().unwrap(), Some(tide()));
}
