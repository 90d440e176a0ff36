pub mod bruteforce;

pub use bruteforce::BruteForceDetector;
