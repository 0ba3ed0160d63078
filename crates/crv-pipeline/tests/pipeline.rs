//! End-to-end scenarios over the full stage chain.

use crv_core::EventId;
use crv_pipeline::pipeline::{run, PipelineConfig};
use crv_pipeline::remap::{map_all, TReadout};
use crv_pipeline::scan::InefficiencyScanner;
use crv_pipeline::sort::sort_layer_sums;
use crv_pipeline::table::{Event, EventTable, ModuleKind, PeGrid};
use crv_pipeline::{clean, trigger};

#[test]
fn clean_map_trigger_scenario() {
    // Event A: every channel 50. Event B: one negative readout.
    let a = Event::new(EventId::new(2101, 0, 0, 0), PeGrid::uniform(50.0));
    let mut bad_grid = PeGrid::uniform(50.0);
    *bad_grid.channel_mut(3, 7) = -1.0;
    let b = Event::new(EventId::new(2101, 0, 0, 1), bad_grid);
    let table = EventTable::new(vec![a, b]);

    let (table, n_removed) = clean::remove_negative_pes(table);
    assert_eq!(n_removed, 1);
    assert_eq!(table.len(), 1);
    assert_eq!(table.events()[0].id.event, 0);

    let (table, mismatches) = map_all(table, TReadout::SingleEnded, true);
    assert!(mismatches.is_empty());

    let l_end = table.events()[0].layers_l_end.as_ref().unwrap();
    for layer in 0..4 {
        assert!((l_end.layer_sum(layer) - 50.0 * 32.0).abs() < 1e-9);
    }

    let table = trigger::evaluate(table, 10.0).unwrap();
    let flags = table.events()[0].triggers.unwrap();
    assert_eq!(flags.l_end_layers, [true; 4]);
    assert!(flags.l_end);
    assert!(flags.ds);
    assert!(flags.combined);
}

#[test]
fn threshold_sweep_jump_scenario() {
    // T single-ended: layer 0 is board 2 channels 0-31. One channel of
    // exactly 15 makes the weakest sorted sum 15 for every event.
    let mut grid = PeGrid::uniform(0.0);
    *grid.channel_mut(2, 0) = 15.0; // layer 0 sum = 15
    *grid.channel_mut(2, 32) = 100.0; // layer 1
    *grid.channel_mut(3, 0) = 100.0; // layer 2
    *grid.channel_mut(3, 32) = 100.0; // layer 3
    let events: Vec<Event> =
        (0..5).map(|i| Event::new(EventId::new(1, 0, 0, i), grid.clone())).collect();

    let (table, _) = map_all(EventTable::new(events), TReadout::SingleEnded, false);
    let table = sort_layer_sums(table, ModuleKind::T).unwrap();
    assert_eq!(table.events()[0].sorted_layer_sums, Some([15.0, 100.0, 100.0, 100.0]));

    let scanner = InefficiencyScanner::new(10.0, 20.0, 3).unwrap();
    let curve = scanner.scan_table(&table).unwrap();
    assert_eq!(curve.thresholds, vec![10.0, 15.0, 20.0]);
    // Rank 0 jumps from fully efficient to fully inefficient at 15.
    assert!((curve.inefficiency[0][0] - 0.0).abs() < 1e-12);
    assert!((curve.inefficiency[0][1] - 1.0).abs() < 1e-12);
    assert!((curve.inefficiency[0][2] - 1.0).abs() < 1e-12);
}

#[test]
fn full_pipeline_with_surviving_events() {
    // Uniform 2.0 grids: 768 total PEs, 512 hit channels, T layer sums
    // of 64, and fiducially masked L-end layer sums of 16 (8 surviving
    // channels), still above the trigger threshold.
    let events: Vec<Event> =
        (0..10).map(|i| Event::new(EventId::new(1, 0, 0, i), PeGrid::uniform(2.0))).collect();
    // One event with a bad readout; one too quiet to pass the total cut.
    let mut bad = PeGrid::uniform(2.0);
    *bad.channel_mut(0, 0) = -2.0;
    let mut events = events;
    events.push(Event::new(EventId::new(1, 0, 0, 10), bad));
    events.push(Event::new(EventId::new(1, 0, 0, 11), PeGrid::uniform(0.1)));

    let config = PipelineConfig {
        min_pes: 100.0,
        max_pes: 1000.0,
        min_hits: 1,
        max_hits: 1000,
        trigger_threshold: 10.0,
        scan_start: 10.0,
        scan_stop: 70.0,
        scan_steps: 4,
        ..Default::default()
    };

    let summary = run(EventTable::new(events), &config).unwrap();
    assert_eq!(summary.n_input, 12);
    assert_eq!(summary.n_negative_removed, 1);
    assert_eq!(summary.n_remap_mismatches, 0);
    // The quiet event falls below the total-signal band.
    assert_eq!(summary.cuts[0].n_removed, 1);
    // Fiducial masking never removes events.
    assert_eq!(summary.cuts[1].n_removed, 0);
    assert_eq!(summary.cuts[2].n_removed, 0);
    assert_eq!(summary.trigger.n_triggered, 10);
    assert_eq!(summary.n_final, 10);

    // T layer sums are 64; failures appear once the threshold passes 64.
    assert_eq!(summary.curve.thresholds, vec![10.0, 30.0, 50.0, 70.0]);
    assert!((summary.curve.inefficiency[0][2] - 0.0).abs() < 1e-12);
    assert!((summary.curve.inefficiency[0][3] - 1.0).abs() < 1e-12);
}

#[test]
fn default_config_on_hot_events_empties_the_table_without_error() {
    // Uniform 50 grids blow through the default total-PE band and the
    // multiplicity cut; the pipeline must still complete and report.
    let events: Vec<Event> =
        (0..3).map(|i| Event::new(EventId::new(1, 0, 0, i), PeGrid::uniform(50.0))).collect();
    let summary = run(EventTable::new(events), &PipelineConfig::default()).unwrap();
    assert_eq!(summary.n_final, 0);
    assert!(summary.curve.inefficiency.iter().all(|r| r.iter().all(|&v| v == 0.0)));
    assert!(summary.curve.uncertainty.iter().all(|r| r.iter().all(|&v| v == 0.0)));
}

#[test]
fn fiducial_mask_changes_downstream_sums_when_sorting_l_end() {
    // Sort on the L-end module after masking: only channels 12-19 count.
    let events = vec![Event::new(EventId::new(1, 0, 0, 0), PeGrid::uniform(2.0))];
    let (table, _) = map_all(EventTable::new(events), TReadout::SingleEnded, false);
    let engine = crv_pipeline::CutEngine::new(table.len());
    let (table, _) = engine.fiducial_cut(table, 12, 19).unwrap();
    let table = sort_layer_sums(table, ModuleKind::LEnd).unwrap();
    // 8 surviving channels of 2.0: sums are 16, not the zero-filled 64.
    assert_eq!(table.events()[0].sorted_layer_sums, Some([16.0, 16.0, 16.0, 16.0]));
}
