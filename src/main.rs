use std::fs::File;
use std::io::{BufWriter, Write};

use pharmcast::analysis::{BrandKpis, GenericEntryKpis, RxOtcKpis, Summary};
use pharmcast::config;
use pharmcast::engine::{Forecast, MonthlyRow};
use pharmcast::scenario::{EngineParams, ForecastOutput, run_forecast, run_scenarios};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut case = "generic".to_string();
    let mut months_override: Option<u32> = None;
    let mut seed_override: Option<u64> = None;
    let mut output_path = "forecast.ndjson".to_string();
    let mut csv_path_opt: Option<String> = None;
    let mut scenarios = false;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--engine" => {
                i += 1;
                case = args[i].clone();
            }
            "--months" => {
                i += 1;
                months_override = Some(args[i].parse().expect("--months requires a u32"));
            }
            "--seed" => {
                i += 1;
                seed_override = Some(args[i].parse().expect("--seed requires a u64"));
            }
            "--output" => {
                i += 1;
                output_path = args[i].clone();
            }
            "--csv" => {
                i += 1;
                csv_path_opt = Some(args[i].clone());
            }
            "--scenarios" => scenarios = true,
            "--quiet" => quiet = true,
            _ => {}
        }
        i += 1;
    }

    let mut base = match case.as_str() {
        "generic" => EngineParams::GenericEntry(config::eliquis_loss_of_exclusivity()),
        "brand" => EngineParams::BrandCompetition(config::glp1_brand_competition()),
        "rx-otc" => EngineParams::RxOtc(config::ppi_rx_to_otc()),
        "sildenafil" => EngineParams::RxOtc(config::sildenafil_omnichannel()),
        other => {
            eprintln!("unknown engine `{other}` (expected generic, brand, rx-otc, sildenafil)");
            std::process::exit(2);
        }
    };

    match &mut base {
        EngineParams::GenericEntry(p) => {
            if let Some(m) = months_override {
                p.horizon_months = m;
            }
            if let Some(s) = seed_override {
                p.tender_seed = s;
            }
        }
        EngineParams::BrandCompetition(p) => {
            if let Some(m) = months_override {
                p.horizon_months = m;
            }
        }
        EngineParams::RxOtc(p) => {
            if let Some(m) = months_override {
                p.horizon_months = m;
            }
        }
    }

    if scenarios {
        let presets = config::presets_for(&base);
        let cmp = run_scenarios(&base, &presets).unwrap_or_else(|e| {
            eprintln!("base run failed: {e}");
            std::process::exit(1);
        });

        if !quiet {
            println!("=== Scenario comparison ({case}) ===");
            println!(
                "{:<24} | {:>6} | {:>14} | {:>14} | {:>9}",
                "Scenario", "Months", "Revenue (M)", "Volume (M)", "Peak mo."
            );
            println!("{}", "-".repeat(80));
            print_comparison_line("Base", &cmp.base.summary());
            for run in &cmp.scenarios {
                match &run.outcome {
                    Ok(output) => print_comparison_line(&run.name, &output.summary()),
                    Err(e) => println!("{:<24} | failed: {e}", run.name),
                }
            }
        }
        return;
    }

    let output = run_forecast(&base).unwrap_or_else(|e| {
        eprintln!("forecast failed: {e}");
        std::process::exit(1);
    });

    let rows = write_ndjson(&output, &output_path);
    if let Some(ref csv_path) = csv_path_opt {
        write_csv(&output, csv_path);
    }

    if !quiet {
        println!("Months written: {rows} → {output_path}");
        print_summary(&output.summary());
        print_kpis(&base, &output);
    }
}

fn print_comparison_line(name: &str, summary: &Summary) {
    println!(
        "{:<24} | {:>6} | {:>14.1} | {:>14.1} | {:>9}",
        name,
        summary.months,
        summary.cumulative_revenue / 1e6,
        summary.cumulative_volume / 1e6,
        summary.peak_revenue_month.0,
    );
}

fn print_summary(summary: &Summary) {
    println!("\n=== Horizon summary ===");
    println!("  Months:              {}", summary.months);
    println!("  Cumulative revenue:  {:>12.1} M", summary.cumulative_revenue / 1e6);
    println!("  Cumulative volume:   {:>12.1} M", summary.cumulative_volume / 1e6);
    println!(
        "  Peak revenue:        {:>12.1} M (month {})",
        summary.peak_revenue / 1e6,
        summary.peak_revenue_month.0
    );
    println!("\n  Source shares over the horizon:");
    for source in &summary.sources {
        println!("    {:<12} {:>6.1}%", source.name, source.share * 100.0);
    }
}

fn print_kpis(base: &EngineParams, output: &ForecastOutput) {
    match (base, output) {
        (EngineParams::GenericEntry(p), ForecastOutput::GenericEntry(fc)) => {
            let kpis = GenericEntryKpis::of(fc, p.entry_month);
            println!("\n=== Loss-of-exclusivity KPIs ===");
            println!("  Revenue at risk:     {:>12.1} M", kpis.cumulative_revenue_at_risk / 1e6);
            if let Some(s) = kpis.originator_share_12m {
                println!("  Share 12m post-LoE:  {:>11.1}%", s * 100.0);
            }
            if let Some(s) = kpis.originator_share_24m {
                println!("  Share 24m post-LoE:  {:>11.1}%", s * 100.0);
            }
        }
        (_, ForecastOutput::BrandCompetition(fc)) => {
            let kpis = BrandKpis::of(fc);
            println!("\n=== Brand competition KPIs ===");
            match kpis.overtake_month {
                Some(m) => println!("  Challenger overtakes in month {}", m.0),
                None => println!("  No overtake within the horizon"),
            }
            println!("  Peak share A:        {:>11.1}%", kpis.peak_share_a * 100.0);
            println!("  Peak share B:        {:>11.1}%", kpis.peak_share_b * 100.0);
        }
        (EngineParams::RxOtc(p), ForecastOutput::RxOtc(fc)) => {
            let kpis = RxOtcKpis::of(fc, p.switch_month);
            println!("\n=== Rx-to-OTC KPIs ===");
            match kpis.crossover_month {
                Some(m) => println!("  OTC overtakes Rx in month {}", m.0),
                None => println!("  No Rx/OTC crossover within the horizon"),
            }
            if let Some(s) = kpis.otc_share_12m {
                println!("  OTC share 12m post-switch: {:>5.1}%", s * 100.0);
            }
            println!("  Cannibalized:        {:>12.1} M", kpis.cumulative_cannibalized / 1e6);
        }
        _ => {}
    }
}

fn write_ndjson(output: &ForecastOutput, path: &str) -> usize {
    fn write_rows<R: MonthlyRow>(fc: &Forecast<R>, path: &str) -> usize {
        let file = File::create(path).unwrap_or_else(|e| panic!("failed to create {path}: {e}"));
        let mut writer = BufWriter::new(file);
        for row in &fc.rows {
            serde_json::to_writer(&mut writer, row).expect("failed to serialize row");
            writeln!(writer).expect("failed to write newline");
        }
        fc.len()
    }
    match output {
        ForecastOutput::GenericEntry(fc) => write_rows(fc, path),
        ForecastOutput::BrandCompetition(fc) => write_rows(fc, path),
        ForecastOutput::RxOtc(fc) => write_rows(fc, path),
    }
}

fn write_csv(output: &ForecastOutput, path: &str) {
    fn write_rows<R: MonthlyRow>(fc: &Forecast<R>, path: &str) {
        let Some(first) = fc.rows.first() else {
            return;
        };
        let file = File::create(path).unwrap_or_else(|e| panic!("failed to create {path}: {e}"));
        let mut w = BufWriter::new(file);
        let sources: Vec<&str> = first.source_volumes().iter().map(|(n, _)| *n).collect();
        writeln!(w, "month,market_volume,{},total_revenue", sources.join(",")).expect("write");
        for row in &fc.rows {
            let volumes: Vec<String> =
                row.source_volumes().iter().map(|(_, v)| format!("{v:.3}")).collect();
            writeln!(
                w,
                "{},{:.3},{},{:.3}",
                row.month().0,
                row.market_volume(),
                volumes.join(","),
                row.total_revenue(),
            )
            .expect("write");
        }
    }
    match output {
        ForecastOutput::GenericEntry(fc) => write_rows(fc, path),
        ForecastOutput::BrandCompetition(fc) => write_rows(fc, path),
        ForecastOutput::RxOtc(fc) => write_rows(fc, path),
    }
}
