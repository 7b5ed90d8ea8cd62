//! Instrumented gradient descent on the Rosenbrock function.
//!
//! Prints progress, logs history every iteration, stores it to disk on a
//! sparse time schedule, and stops after a timeout.
//!
//! # Usage
//!
//! ```text
//! cargo run --example gradient_descent
//! cargo run --example gradient_descent -- 0.5
//! RUST_LOG=opt_tools_tasks=debug cargo run --example gradient_descent
//! ```
//!
//! The optional argument is the timeout in seconds (default 2).

use std::error::Error;

use opt_tools_core::{Action, History, objective};
use opt_tools_tasks::{Config, Driver, ScheduleConfig};
use tracing_subscriber::EnvFilter;

fn rosenbrock(x: &[f64]) -> (f64, Vec<f64>) {
    let (a, b) = (x[0], x[1]);
    let f = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
    let g = vec![
        -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
        200.0 * (b - a * a),
    ];
    (f, g)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let timeout = std::env::args()
        .nth(1)
        .as_deref()
        .map(str::parse::<f64>)
        .transpose()?
        .unwrap_or(2.0);
    let store_path = std::env::temp_dir().join("opthist.json");

    let config = Config {
        display: Some(ScheduleConfig {
            growth: 1.2,
            max_gap: Some(5000.0),
            ..ScheduleConfig::default()
        }),
        history: Some(ScheduleConfig::default()),
        store: Some(ScheduleConfig {
            growth: 1.0,
            max_gap: None,
            start: 0.5,
            ..ScheduleConfig::default()
        }),
        store_path: Some(store_path.clone()),
        timeout: Some(timeout),
        store_gradient: false,
        store_x: true,
    };

    let mut driver = Driver::from_config(objective::combined(rosenbrock), &config)?;

    let mut x = vec![-1.2, 1.0];
    let step_size = 1e-4;
    driver.callback(&x)?;
    let mut stopped = false;
    for _ in 0..2_000_000 {
        let (_, g) = rosenbrock(&x);
        for (xi, gi) in x.iter_mut().zip(&g) {
            *xi -= step_size * gi;
        }
        if driver.callback(&x)? == Some(Action::StopEarly) {
            stopped = true;
            break;
        }
    }
    // A stop request has already finished the run.
    if !stopped {
        driver.finish(&x)?;
    }
    println!();
    if stopped {
        println!("stopped early at iteration {}", driver.iteration());
    }

    let history = History::load(&store_path)?;
    println!(
        "{} rows stored in {}; last x = {:?}",
        history.len(),
        store_path.display(),
        history.last_x()
    );
    println!(
        "optimiser time {:.2}s of {:.2}s total",
        driver.optimisation_time().as_secs_f64(),
        driver.elapsed().as_secs_f64()
    );
    Ok(())
}
