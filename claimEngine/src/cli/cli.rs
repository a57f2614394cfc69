use clap::Parser;

/// Replays a recorded GPS walk through the territory claim engine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, help = "CSV track with latitude,longitude[,accuracy,timestamp,altitude] columns")]
    track: String,

    #[arg(short, long, default_value = "player")]
    owner: String,

    #[arg(short, long, help = "JSON claim configuration; missing fields use defaults")]
    config: Option<String>,

    #[arg(short, long, default_value = "territories.json")]
    store: String,

    #[arg(short, long, help = "CSV POI catalog (id,name,latitude,longitude,category)")]
    pois: Option<String>,

    #[arg(short, long, help = "Name for the claimed territory")]
    name: Option<String>,

    #[arg(long, help = "Validate on the rayon pool instead of inline", default_value_t = false)]
    background: bool,

    #[arg(long, help = "Retries for a failed save or overlap lookup before giving up", default_value_t = 3)]
    save_retries: u32,

    #[arg(long, help = "Override the POI proximity threshold in meters")]
    poi_threshold: Option<f64>,

    #[arg(long, help = "Override the loop closure tolerance in meters")]
    closure_tolerance: Option<f64>,

    #[arg(long, default_value_t = false)]
    enable_timing: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn pois(&self) -> Option<&str> {
        self.pois.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn background(&self) -> bool {
        self.background
    }

    pub fn save_retries(&self) -> u32 {
        self.save_retries
    }

    pub fn poi_threshold(&self) -> Option<f64> {
        self.poi_threshold
    }

    pub fn closure_tolerance(&self) -> Option<f64> {
        self.closure_tolerance
    }

    pub fn enable_timing(&self) -> bool {
        self.enable_timing
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["earthlord", "--track", "walk.csv"]);
        assert_eq!(args.track(), "walk.csv");
        assert_eq!(args.owner(), "player");
        assert_eq!(args.store(), "territories.json");
        assert_eq!(args.save_retries(), 3);
        assert!(args.config().is_none());
        assert!(!args.background());
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "earthlord", "-t", "walk.csv", "--owner", "ada", "--poi-threshold", "75",
            "--closure-tolerance", "20", "--background",
        ]);
        assert_eq!(args.owner(), "ada");
        assert_eq!(args.poi_threshold(), Some(75.0));
        assert_eq!(args.closure_tolerance(), Some(20.0));
        assert!(args.background());
    }
}
