use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{prelude::*, EnvFilter};
use tracing_timing::{Builder, Histogram};

const HISTOGRAM_MAX_NS: u64 = 60_000_000_000;
const HISTOGRAM_SIGFIG: u8 = 3;

// Define categories for different types of operations
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum OperationCategory {
    Tracking,
    Validation {
        subcategory: ValidationType,
    },
    Proximity,
    Persistence {
        subcategory: PersistenceType,
    },
    FileIO {
        subcategory: FileIOType,
    },
    Other,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum ValidationType {
    Full,
    SelfIntersection,
    Overlap,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum PersistenceType {
    Query,
    Save,
    Delete,
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub enum FileIOType {
    ConfigLoad,
    TrackLoad,
    PoiLoad,
    RepositoryLoad,
    RepositorySave,
}

impl OperationCategory {
    pub fn as_str(&self) -> String {
        match self {
            OperationCategory::Tracking => "Tracking".to_string(),
            OperationCategory::Validation { subcategory } => {
                format!("Validation - {}", match subcategory {
                    ValidationType::Full => "Full",
                    ValidationType::SelfIntersection => "Self Intersection",
                    ValidationType::Overlap => "Overlap",
                })
            },
            OperationCategory::Proximity => "Proximity".to_string(),
            OperationCategory::Persistence { subcategory } => {
                format!("Persistence - {}", match subcategory {
                    PersistenceType::Query => "Query",
                    PersistenceType::Save => "Save",
                    PersistenceType::Delete => "Delete",
                })
            },
            OperationCategory::FileIO { subcategory } => {
                format!("File I/O - {}", match subcategory {
                    FileIOType::ConfigLoad => "Config Load",
                    FileIOType::TrackLoad => "Track Load",
                    FileIOType::PoiLoad => "POI Load",
                    FileIOType::RepositoryLoad => "Repository Load",
                    FileIOType::RepositorySave => "Repository Save",
                })
            },
            OperationCategory::Other => "Other Operations".to_string(),
        }
    }
}

thread_local! {
    static TIMING_STACK: RefCell<Vec<(String, OperationCategory, Instant)>> = RefCell::new(Vec::new());
}

lazy_static! {
    static ref TIMING_ENABLED: AtomicBool = AtomicBool::new(false);
    static ref FUNCTION_TIMINGS: Arc<RwLock<HashMap<String, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
    static ref CATEGORY_TIMINGS: Arc<RwLock<HashMap<OperationCategory, Histogram<u64>>>> = Arc::new(RwLock::new(HashMap::new()));
    static ref HIERARCHICAL_TIMINGS: Arc<RwLock<HashMap<String, (Duration, usize, Vec<String>)>>> = Arc::new(RwLock::new(HashMap::new()));
}

pub struct TimingGuard {
    function_name: String,
    category: OperationCategory,
    start: Instant,
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        record_timing_end(&self.function_name, duration, &self.category);
    }
}

pub fn start_timing(function_name: &str, category: OperationCategory) -> TimingGuard {
    let guard = TimingGuard {
        function_name: function_name.to_string(),
        category: category.clone(),
        start: Instant::now(),
    };

    TIMING_STACK.with(|stack| {
        stack.borrow_mut().push((function_name.to_string(), category, Instant::now()));
    });

    guard
}

fn new_histogram() -> Option<Histogram<u64>> {
    Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_NS, HISTOGRAM_SIGFIG).ok()
}

fn record_into<K>(map: &mut HashMap<K, Histogram<u64>>, key: K, duration_ns: u64)
where
    K: std::hash::Hash + Eq,
{
    let histogram = match map.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => match new_histogram() {
            Some(histogram) => entry.insert(histogram),
            None => return,
        },
    };
    let _ = histogram.record(duration_ns.clamp(1, HISTOGRAM_MAX_NS));
}

fn record_timing_end(function_name: &str, duration: Duration, category: &OperationCategory) {
    // The stack is always unwound, even when timing is off
    let parent = TIMING_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.pop();
        stack.last().map(|(parent_name, _, _)| parent_name.clone())
    });

    if !is_timing_enabled() {
        return;
    }

    let duration_ns = duration.as_nanos() as u64;

    {
        let mut hierarchical = HIERARCHICAL_TIMINGS.write();
        let entry = hierarchical
            .entry(function_name.to_string())
            .or_insert((Duration::from_nanos(0), 0, Vec::new()));

        entry.0 += duration;
        entry.1 += 1;

        if let Some(parent_name) = parent {
            if !entry.2.contains(&parent_name) {
                entry.2.push(parent_name);
            }
        }
    }

    record_into(&mut FUNCTION_TIMINGS.write(), function_name.to_string(), duration_ns);
    record_into(&mut CATEGORY_TIMINGS.write(), category.clone(), duration_ns);
}

/// Installs the global tracing subscriber. `verbose` lowers the crate's level to debug.
pub fn init_logging(enable_timing: bool, verbose: bool) -> Result<(), SetGlobalDefaultError> {
    TIMING_ENABLED.store(enable_timing, Ordering::SeqCst);

    let crate_level = if verbose { "earthlord=debug" } else { "earthlord=info" };
    let mut env_filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if let Ok(directive) = crate_level.parse() {
        env_filter = env_filter.add_directive(directive);
    }

    match new_histogram().filter(|_| enable_timing) {
        Some(prototype) => {
            let timing_layer = Builder::default().layer(move || prototype.clone());

            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .with(timing_layer.boxed());

            tracing::subscriber::set_global_default(subscriber)
        }
        None => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty());

            tracing::subscriber::set_global_default(subscriber)
        }
    }
}

pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::SeqCst)
}

/// Claim stage a category rolls up into, in the order an attempt passes through them.
fn stage_of(category: &OperationCategory) -> (u8, &'static str) {
    match category {
        OperationCategory::FileIO { .. } => (0, "Inputs"),
        OperationCategory::Tracking => (1, "Tracking"),
        OperationCategory::Proximity => (2, "POI proximity"),
        OperationCategory::Validation { .. } => (3, "Validation"),
        OperationCategory::Persistence { .. } => (4, "Persistence"),
        OperationCategory::Other => (5, "Other"),
    }
}

fn millis(nanos: f64) -> f64 {
    nanos / 1_000_000.0
}

fn render_report(
    categories: &HashMap<OperationCategory, Histogram<u64>>,
    functions: &HashMap<String, (Duration, usize, Vec<String>)>,
    slowest: usize,
) -> String {
    let mut out = String::from("\nClaim pipeline timing\n");

    let mut rows: Vec<(u8, &'static str, String, &Histogram<u64>)> = categories
        .iter()
        .map(|(category, histogram)| {
            let (order, stage) = stage_of(category);
            (order, stage, category.as_str(), histogram)
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));

    let mut current_stage = None;
    for (_, stage, name, histogram) in &rows {
        if current_stage != Some(*stage) {
            let (count, total) = rows
                .iter()
                .filter(|row| row.1 == *stage)
                .fold((0u64, 0.0), |(n, t), row| (n + row.3.len(), t + row.3.mean() * row.3.len() as f64));
            let _ = writeln!(out, "{:<14} {:>6} calls {:>10.3} ms", stage, count, millis(total));
            current_stage = Some(*stage);
        }
        let _ = writeln!(
            out,
            "  {:<30} n={:<5} mean={:.3} ms  max={:.3} ms",
            name,
            histogram.len(),
            millis(histogram.mean()),
            millis(histogram.max() as f64),
        );
    }

    let mut steps: Vec<_> = functions.iter().collect();
    steps.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.0.cmp(b.0)));
    if !steps.is_empty() {
        out.push_str("Slowest steps\n");
    }
    for (rank, (name, (total, count, callers))) in steps.into_iter().take(slowest).enumerate() {
        let _ = write!(out, "  {}. {} {:.3} ms over {} call(s)", rank + 1, name, total.as_secs_f64() * 1000.0, count);
        if !callers.is_empty() {
            let _ = write!(out, " via {}", callers.join(", "));
        }
        out.push('\n');
    }

    out
}

/// Prints per-stage claim timings and the slowest timed steps. No-op unless timing is enabled.
pub fn print_timing_report() {
    if !is_timing_enabled() {
        return;
    }
    print!("{}", render_report(&CATEGORY_TIMINGS.read(), &HIERARCHICAL_TIMINGS.read(), 5));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names() {
        let c = OperationCategory::Validation { subcategory: ValidationType::Overlap };
        assert_eq!(c.as_str(), "Validation - Overlap");
        let c = OperationCategory::FileIO { subcategory: FileIOType::PoiLoad };
        assert_eq!(c.as_str(), "File I/O - POI Load");
    }

    #[test]
    fn test_guard_unwinds_stack() {
        {
            let _outer = start_timing("outer", OperationCategory::Tracking);
            let _inner = start_timing("inner", OperationCategory::Proximity);
        }
        TIMING_STACK.with(|stack| assert!(stack.borrow().is_empty()));
    }

    #[test]
    fn test_report_follows_claim_stages() {
        let mut categories = HashMap::new();
        for (category, nanos) in [
            (OperationCategory::Persistence { subcategory: PersistenceType::Save }, 4_000_000),
            (OperationCategory::Validation { subcategory: ValidationType::Overlap }, 2_000_000),
            (OperationCategory::Validation { subcategory: ValidationType::Full }, 3_000_000),
            (OperationCategory::Tracking, 1_000),
        ] {
            record_into(&mut categories, category, nanos);
        }
        let mut functions = HashMap::new();
        functions.insert("validate_attempt".to_string(), (Duration::from_millis(3), 1, vec!["finish".to_string()]));
        functions.insert("ingest_sample".to_string(), (Duration::from_micros(1), 1, Vec::new()));

        let report = render_report(&categories, &functions, 1);
        let tracking = report.find("Tracking").unwrap();
        let validation = report.find("Validation ").unwrap();
        let persistence = report.find("Persistence ").unwrap();
        assert!(tracking < validation && validation < persistence);
        assert!(report.contains("Validation - Overlap"));
        assert!(report.contains("1. validate_attempt 3.000 ms over 1 call(s) via finish"));
        assert!(!report.contains("ingest_sample"));
    }
}
