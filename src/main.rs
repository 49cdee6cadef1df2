//! Factory Planner
//!
//! Production chain and factory site planner for Satisfactory.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;

use factory_planner::allocator::allocate_production;
use factory_planner::calculator::{DemandMode, generate_plan_with};
use factory_planner::config::PlannerConfig;
use factory_planner::db::{self, Catalog};
use factory_planner::graph::{build_graph, format_dag};
use factory_planner::locations::{Quadrant, find_locations};
use factory_planner::models::Factory;
use factory_planner::modules::compute_modules;
use factory_planner::planner::{self, PlanRequest};
use factory_planner::{extract, logging, sample};

#[derive(Parser)]
#[command(name = "factory-planner")]
#[command(about = "Production chain and factory site planner for Satisfactory")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "satisfactory.db", global = true)]
    database: PathBuf,

    /// Planner settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Import game-data JSON exports
    Extract {
        /// Directory holding items.json, buildings.json, recipes.json, ...
        data_dir: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// Load sample data for testing (without a game-data export)
    LoadSample,

    /// List items worth planning a factory for
    Targets,

    /// List the recipes producing an item
    Recipes {
        item: String,
    },

    /// List the theme catalog
    Themes,

    /// Resolve a target into its graph and themes
    Analyze {
        item: String,

        /// Target rate in items/min
        #[arg(short, long, default_value = "10.0")]
        rate: f64,

        /// Recipe names to leave out
        #[arg(short = 'x', long = "exclude")]
        excluded: Vec<String>,

        #[arg(long)]
        max_factories: Option<usize>,
    },

    /// Rank factory sites for a set of resources
    Locations {
        /// Resource demand, e.g. "Iron Ore=120"
        #[arg(long = "resource", value_parser = parse_key_val, required = true)]
        resources: Vec<(String, f64)>,

        /// Search radius in metres
        #[arg(long)]
        radius: Option<f64>,

        #[arg(short, long)]
        n_results: Option<usize>,

        #[arg(long = "exclude-quadrant", value_enum)]
        excluded_quadrants: Vec<Quadrant>,
    },

    /// Split a target rate across factories read from a JSON file
    Allocate {
        /// JSON array of {theme_id, demands_per_unit, local_capacity}
        factories: PathBuf,

        #[arg(short, long)]
        rate: f64,

        #[arg(long)]
        train_penalty: Option<f64>,

        #[arg(long)]
        water_penalty: Option<f64>,
    },

    /// Plan one factory for an item at a given rate
    Generate {
        item: String,

        #[arg(short, long, default_value = "10.0")]
        rate: f64,

        /// Local extraction capacity, e.g. "Iron Ore=600"
        #[arg(long = "local", value_parser = parse_key_val)]
        local: Vec<(String, f64)>,

        #[arg(short = 'x', long = "exclude")]
        excluded: Vec<String>,

        #[arg(long, value_enum, default_value_t = DemandMode::FirstVisit)]
        mode: DemandMode,

        /// Show the production tree
        #[arg(long)]
        tree: bool,
    },

    /// Full plan: themes, sites, allocation and per-factory plans
    Plan {
        item: String,

        #[arg(short, long, default_value = "10.0")]
        rate: f64,

        #[arg(short = 'x', long = "exclude")]
        excluded: Vec<String>,

        #[arg(long)]
        max_factories: Option<usize>,

        #[arg(long)]
        radius: Option<f64>,

        #[arg(long = "exclude-quadrant", value_enum)]
        excluded_quadrants: Vec<Quadrant>,

        #[arg(long)]
        train_penalty: Option<f64>,

        #[arg(long)]
        water_penalty: Option<f64>,

        #[arg(long, value_enum, default_value_t = DemandMode::FirstVisit)]
        mode: DemandMode,
    },
}

/// Parse `NAME=VALUE`; the name may contain spaces.
fn parse_key_val(s: &str) -> std::result::Result<(String, f64), String> {
    let (key, value) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad value in '{s}': {e}"))?;
    Ok((key.trim().to_string(), value))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = PlannerConfig::load(cli.config.as_deref())?;
    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Extract { data_dir, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_extracted_data(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &data_dir)?;
            println!("{}", stats);
        }

        Commands::LoadSample => {
            sample::load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Targets => {
            let items = db::list_target_items(&conn)?;
            if cli.json {
                print_json(&items)?;
            } else if items.is_empty() {
                println!("No target items in database. Run 'extract' or 'load-sample' first.");
            } else {
                for item in items {
                    println!("  {}", item.name);
                }
            }
        }

        Commands::Recipes { item } => {
            let recipes = conn.recipes_producing(&item)?;
            if cli.json {
                print_json(&recipes)?;
            } else if recipes.is_empty() {
                println!("No recipes produce '{}'", item);
            } else {
                println!("{:<36} {:<16} {:>8}  Alt", "Recipe", "Building", "Time (s)");
                println!("{}", "-".repeat(66));
                for r in recipes {
                    let alt = if r.is_alternate() { "yes" } else { "" };
                    println!("{:<36} {:<16} {:>8.1}  {}", r.name, r.building, r.duration_s, alt);
                }
            }
        }

        Commands::Themes => {
            let themes = config.themes()?;
            if cli.json {
                print_json(&themes)?;
            } else {
                for t in themes {
                    let resources: Vec<&str> = t.primary_resources.iter().map(String::as_str).collect();
                    println!("{:<20} {}", t.id, resources.join(", "));
                }
            }
        }

        Commands::Analyze {
            item,
            rate,
            excluded,
            max_factories,
        } => {
            let themes = config.themes()?;
            let max_factories = max_factories.unwrap_or(config.max_factories);
            let analysis = planner::analyze(&conn, &themes, &item, rate, &excluded, max_factories)?;

            if cli.json {
                print_json(&analysis.report())?;
            } else {
                println!("{}", format_dag(&analysis.dag));
                println!("Themes:");
                for a in &analysis.assignments {
                    println!("  {:<20} {:.3}/unit  ({})", a.theme.id, a.total_demand(), a.recipes.join(", "));
                }
                println!("\nRaw demand @ {:.2}/min:", rate);
                for (resource, demand) in &analysis.raw_demands {
                    println!("  {} @ {:.2}/min", resource, demand);
                }
            }
        }

        Commands::Locations {
            resources,
            radius,
            n_results,
            excluded_quadrants,
        } => {
            let nodes = db::load_resource_nodes(&conn)?;
            let critical: BTreeMap<String, f64> = resources.into_iter().collect();
            let results = find_locations(
                &nodes,
                &critical,
                radius.unwrap_or(config.search_radius_m),
                n_results.unwrap_or(config.n_results),
                &excluded_quadrants,
            );

            if cli.json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No site has every resource within range.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "#{} score {:.1} at ({:.0}, {:.0}), {} nodes",
                        i + 1,
                        r.score,
                        r.center.x,
                        r.center.y,
                        r.nearby_nodes.len()
                    );
                    for (resource, detail) in &r.resources {
                        println!("    {:<16} {} nodes, score {:.1}", resource, detail.node_count, detail.score);
                    }
                }
            }
        }

        Commands::Allocate {
            factories,
            rate,
            train_penalty,
            water_penalty,
        } => {
            let content =
                fs::read_to_string(&factories).with_context(|| format!("Failed to read {}", factories.display()))?;
            let factories: Vec<Factory> =
                serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", factories.display()))?;
            let allocations = allocate_production(
                &factories,
                rate,
                train_penalty.unwrap_or(config.train_penalty),
                water_penalty.unwrap_or(config.water_penalty),
            );

            if cli.json {
                print_json(&allocations)?;
            } else {
                println!("{:<20} {:>12} {:>12}", "Theme", "Rate/min", "Effort");
                println!("{}", "-".repeat(46));
                for a in allocations {
                    println!("{:<20} {:>12.2} {:>12.1}", a.theme_id, a.allocated_rate, a.effort);
                }
            }
        }

        Commands::Generate {
            item,
            rate,
            local,
            excluded,
            mode,
            tree,
        } => {
            let dag = build_graph(&conn, &item, &excluded)?;
            let local: BTreeMap<String, f64> = local.into_iter().collect();
            let plan = generate_plan_with(&dag, rate, &local, mode);
            let module = compute_modules(&dag, &plan);

            if cli.json {
                #[derive(Serialize)]
                struct Generated<'a> {
                    plan: &'a factory_planner::calculator::Plan,
                    module: &'a factory_planner::modules::Module,
                }
                print_json(&Generated {
                    plan: &plan,
                    module: &module,
                })?;
            } else {
                if tree {
                    println!("Production tree:\n");
                    println!("{}", format_dag(&dag));
                }
                println!("{}", plan);
                println!("{}", module);
            }
        }

        Commands::Plan {
            item,
            rate,
            excluded,
            max_factories,
            radius,
            excluded_quadrants,
            train_penalty,
            water_penalty,
            mode,
        } => {
            let themes = config.themes()?;
            let nodes = db::load_resource_nodes(&conn)?;
            let request = PlanRequest {
                target_item: item,
                target_rate: rate,
                excluded_recipes: excluded,
                max_factories: max_factories.unwrap_or(config.max_factories),
                search_radius_m: radius.unwrap_or(config.search_radius_m),
                excluded_quadrants,
                train_penalty: train_penalty.unwrap_or(config.train_penalty),
                water_penalty: water_penalty.unwrap_or(config.water_penalty),
                demand_mode: mode,
            };
            let reports = planner::plan_factories(&conn, &themes, &nodes, &request)?;

            if cli.json {
                print_json(&reports)?;
            } else {
                for r in &reports {
                    println!("##### {} #####", r.theme_id);
                    match &r.location {
                        Some(site) => println!("Site: ({:.0}, {:.0}), score {:.1}", site.center.x, site.center.y, site.score),
                        None => println!("Site: none found, everything by train"),
                    }
                    println!(
                        "Allocated {:.2}/min, effort {:.1}\n",
                        r.allocation.allocated_rate, r.allocation.effort
                    );
                    println!("{}", r.plan);
                    println!("{}", r.module);
                }
            }
        }
    }

    Ok(())
}
