use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use colored::Colorize;
use famhub_repo::engine;
use famhub_sdk::{FamilyHub, HubConfig};
use famhub_types::{default_templates, Family, FamilyMember, FamilyRole};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::cli::*;

const OWNER: &str = "famhub-cli";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Seed(args) => cmd_seed(config, args, &cli.format),
        Command::Simulate(args) => cmd_simulate(config, args, &cli.format),
        Command::Churn(args) => cmd_churn(config, args, &cli.format),
        Command::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HubConfig> {
    match path {
        Some(path) => HubConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(HubConfig::default()),
    }
}

fn open(hub: &FamilyHub, family_id: &str) -> anyhow::Result<Vec<FamilyRole>> {
    let now = hub.clock().now();
    let family = Family {
        id: family_id.to_string(),
        name: family_id.to_string(),
        owner_id: OWNER.to_string(),
        members: vec![FamilyMember {
            user_id: OWNER.to_string(),
            role_ids: Vec::new(),
            joined_at: now,
            invited_by: None,
        }],
        photo_url: None,
        created_at: now,
        updated_at: None,
    };
    Ok(hub.open_family(family)?)
}

fn print_roles(roles: &[FamilyRole]) {
    for role in roles {
        let marker = if role.is_default { "*".green().bold() } else { " ".normal() };
        println!(
            "  {} {:>2}  {:<16} {}",
            marker,
            role.display_order,
            role.title.bold(),
            format!("{:?}", role.permissions).dimmed()
        );
    }
}

fn cmd_seed(config: HubConfig, args: SeedArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let hub = FamilyHub::new(config)?;
    let roles = open(&hub, &args.family)?;
    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&roles)?);
        return Ok(());
    }
    println!(
        "{} Opened family {} with {} roles",
        "✓".green().bold(),
        args.family.yellow(),
        roles.len()
    );
    print_roles(&roles);
    Ok(())
}

fn cmd_simulate(
    config: HubConfig,
    args: SimulateArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let hub = FamilyHub::new(config)?;
    open(&hub, &args.family)?;

    let events = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&events);
    let token = hub.roles().observe(
        &args.family,
        Box::new(move |delivery| {
            if let Ok(batch) = delivery {
                counter.fetch_add(batch.len(), Ordering::Relaxed);
            }
        }),
    );

    let template = default_templates()[0].clone();
    let failures = AtomicUsize::new(0);
    thread::scope(|scope| {
        for worker in 0..args.workers {
            let (hub, template, failures, family) = (&hub, &template, &failures, &args.family);
            scope.spawn(move || {
                for i in 0..args.per_worker {
                    let role = template
                        .with_title(&format!("Worker {worker} role {i}"))
                        .instantiate(family, FamilyRole::APPEND, false, hub.clock().now());
                    if let Err(error) = hub.roles().create(role) {
                        debug!(worker, %error, "create rejected");
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    hub.listeners().flush();
    token.cancel();

    let roles = hub.roles().roles(&args.family);
    engine::check_invariants(&roles).context("role invariants broken after simulation")?;
    let events = events.load(Ordering::Relaxed);
    let failures = failures.load(Ordering::Relaxed);
    let default = roles.iter().find(|r| r.is_default).map(|r| r.title.as_str());

    if *format == OutputFormat::Json {
        let report = serde_json::json!({
            "family": args.family,
            "roles": roles.len(),
            "events": events,
            "rejected": failures,
            "default": default,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "{} {} workers x {} creates on {}",
        "✓".green().bold(),
        args.workers,
        args.per_worker,
        args.family.yellow()
    );
    println!("  Roles: {}  (orders 0..{})", roles.len().to_string().bold(), roles.len());
    println!("  Default: {}", default.unwrap_or("-").cyan());
    println!("  Events observed: {}", events.to_string().bold());
    if failures > 0 {
        println!("  Rejected: {}", failures.to_string().red());
    }
    Ok(())
}

fn cmd_churn(config: HubConfig, args: ChurnArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let hub = FamilyHub::new(config)?;
    open(&hub, &args.family)?;
    let roles_repo = hub.roles();
    let family = args.family.as_str();
    let template = default_templates()[1].clone();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut counter = 0usize;
    let mut applied = 0usize;
    let mut rejected = 0usize;

    for step in 0..args.ops {
        let roles = roles_repo.roles(family);
        counter += 1;
        let title = format!("Role {counter}");

        let outcome = match (rng.gen_range(0..5), roles.choose(&mut rng)) {
            (0, _) | (_, None) => {
                let is_default = rng.gen_bool(0.2);
                let role = template.with_title(&title).instantiate(
                    family,
                    FamilyRole::APPEND,
                    is_default,
                    hub.clock().now(),
                );
                roles_repo.create(role).map(drop)
            }
            (1, Some(picked)) => {
                let mut role = picked.clone();
                role.title = title;
                role.is_default = rng.gen_bool(0.3);
                roles_repo.update(role).map(drop)
            }
            (2, Some(picked)) => roles_repo.delete(&picked.id, family).map(drop),
            (3, Some(_)) => {
                let mut ids: Vec<String> = roles.iter().map(|r| r.id.clone()).collect();
                ids.shuffle(&mut rng);
                roles_repo.reorder(&ids, family).map(drop)
            }
            (_, Some(picked)) => roles_repo.set_default(&picked.id, family).map(drop),
        };
        match outcome {
            Ok(()) => applied += 1,
            Err(error) => {
                debug!(step, %error, "operation rejected");
                rejected += 1;
            }
        }

        engine::check_invariants(&roles_repo.roles(family))
            .with_context(|| format!("role invariants broken after step {step}"))?;
    }

    let roles = roles_repo.roles(family);
    if *format == OutputFormat::Json {
        let report = serde_json::json!({
            "family": family,
            "seed": args.seed,
            "applied": applied,
            "rejected": rejected,
            "roles": roles,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "{} {} operations (seed {}): {} applied, {} rejected, invariants held",
        "✓".green().bold(),
        args.ops,
        args.seed,
        applied,
        rejected
    );
    print_roles(&roles);
    Ok(())
}

fn cmd_config(config: &HubConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
