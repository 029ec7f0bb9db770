//! CLI interface for rust-itinerary

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_itinerary::{
    AttractionSource, AttractionTable, PlannerConfig, TravelPlan, TravelPreferences,
    TripPlanner, MAX_DAYS,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rust-itinerary")]
#[command(about = "AI-assisted travel itinerary planner")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan a trip
    Plan {
        /// Destination shown to the traveller (province, region or city)
        #[arg(short, long, default_value = "")]
        destination: String,
        /// City used for attraction lookups
        #[arg(short, long, default_value = "")]
        city: String,
        /// Free-text interests, e.g. "历史 美食"
        #[arg(short, long, default_value = "")]
        interests: String,
        /// Budget in yuan
        #[arg(long)]
        budget: Option<String>,
        /// Number of days (1-30)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_DAYS as i64))]
        days: Option<u32>,
        /// Number of travellers
        #[arg(long)]
        group_size: Option<u32>,
        /// Travel style, e.g. "休闲" or "紧凑"
        #[arg(long)]
        style: Option<String>,
        /// Start date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Skip the AI provider and plan from local attraction data
        #[arg(long)]
        offline: bool,
        /// Attraction table JSON to use instead of the bundled one
        #[arg(long)]
        attractions: Option<PathBuf>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// List cities in the attraction table
    Cities {
        /// Attraction table JSON to use instead of the bundled one
        #[arg(long)]
        attractions: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            destination,
            city,
            interests,
            budget,
            days,
            group_size,
            style,
            start_date,
            offline,
            attractions,
            output,
        } => {
            let prefs = TravelPreferences {
                destination,
                city,
                interests,
                budget,
                duration_days: days,
                group_size,
                travel_style: style,
                start_date,
            };

            if prefs.place().is_empty() {
                eprintln!("Either --destination or --city is required");
                std::process::exit(2);
            }

            let mut config = PlannerConfig::from_env()?;
            if let Some(path) = attractions {
                config = config.with_attractions(AttractionSource::File(path));
            }
            let planner = TripPlanner::new(config)?;

            println!("Planning trip to {}...", prefs.destination_label());
            let result = if offline {
                planner.plan_offline(&prefs, prefs.resolved_start_date())
            } else {
                let outcome = planner.plan(&prefs).await;
                if let Some(notice) = outcome.notice() {
                    eprintln!("{}", notice);
                }
                outcome.into_result()
            };

            match result {
                Ok(plan) => {
                    let json = serde_json::to_string_pretty(&plan)?;

                    if let Some(output_file) = output {
                        fs::write(&output_file, &json)?;
                        println!("Results saved to {}", output_file);
                    } else {
                        println!("{}", json);
                    }

                    print_summary(&plan);
                }
                Err(e) => {
                    eprintln!("Error planning trip: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Cities { attractions } => {
            let source = attractions.map(AttractionSource::File).unwrap_or_default();
            let table: AttractionTable = source.load()?;
            for city in table.cities() {
                let categories: Vec<&str> = city.categories.iter().map(|c| c.category.as_str()).collect();
                println!("{} ({})", city.city, categories.join(", "));
            }
        }
    }

    Ok(())
}

fn print_summary(plan: &TravelPlan) {
    println!("\nSummary:");
    println!("Start date: {}", plan.start_date);
    println!("Days: {}", plan.days.len());
    println!("Activities: {}", plan.activity_count());
    println!("Total cost: {} (group of {})", plan.total_cost, plan.recommended_group_size);
}
