use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use process_scheduler::SchedulingPolicy;
use sim_core::{generate_workload, parse_policy, SimConfig};

/// MiniOS - user-space process scheduling simulator.
#[derive(Parser)]
#[command(name = "minios", about = "Simulate an OS process scheduler, allocator, I/O pool, and sync primitives")]
struct Args {
    /// Scheduling algorithm: fcfs, rr, or priority. Unknown values fall back to fcfs.
    #[arg(short = 'a', long = "algorithm", default_value = "fcfs")]
    algorithm: String,

    /// Number of processes to simulate (1..=20).
    #[arg(short = 'n', long = "processes", default_value_t = 5)]
    processes: i64,

    /// Quantum for Round Robin, in ticks (>=1).
    #[arg(short = 'q', long = "quantum", default_value_t = 5)]
    quantum: i64,

    /// Maximum simulated ticks (>=1).
    #[arg(short = 't', long = "max-time", default_value_t = 100)]
    max_time: i64,

    /// Seed for the workload RNG. Defaults to a wall-clock-derived value.
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Trace file name, written under traces/.
    #[arg(long = "trace-file", default_value = "minios_trace.txt")]
    trace_file: String,
}

fn print_banner() {
    println!();
    println!("+---------------------------------------------------------+");
    println!("|              MiniOS - Simulation d'OS                    |");
    println!("|       Systeme d'exploitation en espace utilisateur       |");
    println!("+---------------------------------------------------------+");
    println!();
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn main() {
    env_logger::init();
    print_banner();

    let args = Args::parse();

    let policy = parse_policy(&args.algorithm);
    if policy == SchedulingPolicy::Fcfs && !matches!(args.algorithm.to_ascii_lowercase().as_str(), "fcfs") {
        log::warn!("unrecognized algorithm '{}', falling back to fcfs", args.algorithm);
    }

    let seed = args.seed.unwrap_or_else(wall_clock_seed);
    let config = SimConfig::clamped(policy, args.processes, args.quantum, args.max_time, seed);

    println!("Configuration:");
    println!("   Algorithme: {}", config.policy.label());
    println!("   Processus: {}", config.process_count);
    println!("   Quantum: {}", config.quantum);
    println!("   Temps max: {}", config.max_time);
    println!();

    let workload = generate_workload(config.process_count, config.seed);
    println!("{} processus crees\n", workload.len());

    println!("Demarrage de la simulation...\n");

    let traces_dir = Path::new("traces");
    let mut sim = match sim_core::Simulation::new(config, &workload, traces_dir, &args.trace_file) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("Erreur lors de l'initialisation du systeme: {err}");
            std::process::exit(1);
        }
    };

    let summary = match sim.run() {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("La simulation s'est arretee en erreur: {err}");
            std::process::exit(1);
        }
    };

    println!("\nSimulation terminee a t={}", summary.ticks_run);
    println!("\n=== Resume ===");
    println!("Processus termines: {}", summary.stats.completed);
    println!("Turnaround moyen:   {:>8.2}", summary.stats.avg_turnaround);
    println!("Reponse moyenne:    {:>8.2}", summary.stats.avg_response);
    println!("Attente moyenne:    {:>8.2}", summary.stats.avg_wait);
    println!("Changements de contexte: {}", summary.total_context_switches);
    println!("Evenements traces:       {}", summary.event_count);

    println!("\nTrace sauvegardee dans traces/{}", args.trace_file);
}
