use std::fs;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use sas_curves::app::pipeline::{fit_dataset, run_batch, run_fit};
use sas_curves::data::{Dataset, SampleSpec, generate_sample};
use sas_curves::domain::{FitConfig, Interval};
use sas_curves::error::SasError;
use sas_curves::io::{LoadOptions, load_dataset, read_fit_record, write_dataset_csv};
use sas_curves::mask::{MaskSelector, Maskable};

/// Write a curve in the three-line-header lab format.
fn write_lab_file(dir: &tempfile::TempDir, name: &str, data: &Dataset) -> PathBuf {
    let mut text = String::from("Sample: synthetic\nq(1/A) I(q) err\n--------\n");
    for (q, i) in data.points() {
        text.push_str(&format!("{q:.12e} {i:.12e} {:.3e}\n", i * 0.01));
    }
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn load_mask_fit_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let data = generate_sample(&SampleSpec::default()).unwrap();
    let input = write_lab_file(&dir, "curve.dat", &data);

    let config = FitConfig {
        skip_rows: 3,
        keep: vec![Interval::new(0.0, 0.1).unwrap()],
        export_fit_csv: Some(dir.path().join("fit.csv")),
        export_record: Some(dir.path().join("fit.json")),
        ..FitConfig::default()
    };
    let run = run_fit(&input, &config).unwrap();

    assert_eq!(run.loaded.len(), 100);
    assert!(run.fitted.q().iter().all(|&q| q <= 0.1));
    assert!(run.outcome.converged);
    assert_abs_diff_eq!(run.outcome.value("i0").unwrap(), 5.0, epsilon = 1e-4);
    assert_abs_diff_eq!(run.outcome.value("rg").unwrap(), 20.0, epsilon = 1e-4);
    assert_abs_diff_eq!(run.outcome.value("background").unwrap(), 2.0, epsilon = 1e-4);

    let csv = fs::read_to_string(dir.path().join("fit.csv")).unwrap();
    assert_eq!(csv.lines().count(), run.fitted.len() + 1);

    let record = read_fit_record(&dir.path().join("fit.json")).unwrap();
    assert_eq!(record.keep, config.keep);
    assert_eq!(record.quality.n, run.fitted.len());
    assert_eq!(record.source.as_deref(), Some(input.as_path()));
    assert_abs_diff_eq!(record.parameters[0].value, run.outcome.params[0]);
}

#[test]
fn noisy_curve_fits_near_truth() {
    let data = generate_sample(&SampleSpec {
        noise: 0.01,
        seed: 7,
        ..SampleSpec::default()
    })
    .unwrap();
    let (_, outcome) = fit_dataset(&data, &FitConfig::default()).unwrap();

    assert!(outcome.converged);
    assert_abs_diff_eq!(outcome.value("i0").unwrap(), 5.0, epsilon = 0.2);
    assert_abs_diff_eq!(outcome.value("rg").unwrap(), 20.0, epsilon = 1.5);
    assert_abs_diff_eq!(outcome.value("background").unwrap(), 2.0, epsilon = 0.1);
    assert!(outcome.std_errors.is_some());
}

#[test]
fn mask_outside_the_data_leaves_nothing_to_fit() {
    let data = generate_sample(&SampleSpec::default()).unwrap();
    let config = FitConfig {
        keep: vec![Interval::new(1.0, 2.0).unwrap()],
        ..FitConfig::default()
    };
    let err = fit_dataset(&data, &config).unwrap_err();
    assert!(matches!(err, SasError::EmptyInput(_)));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn selector_reuses_compiled_ranges_across_curves() {
    let a = generate_sample(&SampleSpec::default()).unwrap();
    let b = generate_sample(&SampleSpec {
        points: 31,
        ..SampleSpec::default()
    })
    .unwrap();
    let ranges = [Interval::new(0.05, 0.1).unwrap(), Interval::new(0.0, 0.02).unwrap()];
    let mut selector = MaskSelector::new(&ranges).unwrap();

    for data in [&a, &b] {
        selector.build(data);
        let masked = selector.apply(data).unwrap();
        assert_eq!(masked, data.mask_ranges(&ranges).unwrap());
        assert!(masked.q().iter().all(|&q| q <= 0.02 || (0.05..=0.1).contains(&q)));
    }
}

#[test]
fn batch_reports_every_file_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let good = generate_sample(&SampleSpec {
        rg: 30.0,
        ..SampleSpec::default()
    })
    .unwrap();
    let good_path = dir.path().join("good.csv");
    write_dataset_csv(&good_path, &good).unwrap();
    let bad_path = dir.path().join("bad.csv");
    fs::write(&bad_path, "q,i\n0.1,oops\n").unwrap();
    let missing = dir.path().join("missing.dat");

    let config = FitConfig {
        skip_rows: 1,
        ..FitConfig::default()
    };
    let results = run_batch(&[good_path.clone(), bad_path, missing], &config);

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].label, good_path.display().to_string());
    let rg = results[0].outcome.as_ref().unwrap().value("rg").unwrap();
    assert_abs_diff_eq!(rg, 30.0, epsilon = 1e-4);
    assert!(matches!(results[1].outcome, Err(SasError::Parse(_))));
    assert!(matches!(results[2].outcome, Err(SasError::Io { .. })));
}

#[test]
fn combined_curves_reload_identically() {
    let dir = tempfile::tempdir().unwrap();
    let a = generate_sample(&SampleSpec::default()).unwrap();
    let sum = (&(&a + &a).unwrap() * 0.5).unwrap();
    let path = dir.path().join("sum.csv");
    write_dataset_csv(&path, &sum).unwrap();

    let back = load_dataset(&path, &LoadOptions { skip_rows: 1 }).unwrap();
    assert_eq!(back.len(), a.len());
    for (x, y) in back.i().iter().zip(a.i()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
    }
}
