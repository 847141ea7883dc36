use thiserror::Error;


/// Everything that can abort an assignment run.  Configuration problems are caught before any
/// worker is dispatched; the rest surface mid-run and terminate the whole run.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Weight '{0}' is not an edge attribute (expected 'flow_time (s)' or 'length (m)')")]
    UnknownWeight(String),
    #[error("Edge ({from}, {to}) has invalid {field}: {value}")]
    InvalidSegment {
        from: u64,
        to: u64,
        field: &'static str,
        value: f64,
    },
    #[error("Road network has no edges")]
    EmptyNetwork,
    #[error("Zone {0} has no member nodes")]
    EmptyZone(usize),
    #[error("Node {0} is not in the road network")]
    UnknownNode(u64),
    #[error("Node {0} was added twice")]
    DuplicateNode(u64),
    #[error("No edge from node {0} to node {1}")]
    MissingEdge(u64, u64),
    #[error("Demand must be a square matrix, got {0}x{1}")]
    NonSquareDemand(usize, usize),
    #[error("Requested {requested} zones but the demand only covers {available}")]
    MatrixTooSmall { requested: usize, available: usize },
    #[error("Failed to find required number {requested} of paths from zone {origin_zone} to \
             zone {destination_zone}: {found} found after {attempts} attempts")]
    PathsExhausted {
        origin_zone: usize,
        destination_zone: usize,
        requested: usize,
        found: usize,
        attempts: usize,
    },
    #[error("Replayed pair ({origin}, {destination}) was recorded for zones ({recorded_origin}, \
             {recorded_destination}) but zones ({origin_zone}, {destination_zone}) were requested")]
    ReplayMismatch {
        origin: u64,
        destination: u64,
        recorded_origin: usize,
        recorded_destination: usize,
        origin_zone: usize,
        destination_zone: usize,
    },
    #[error("Replay for zones ({0}, {1}) ran out of recorded node pairs")]
    ReplayExhausted(usize, usize),
    #[error("Gravity model did not converge after {0} iterations")]
    GravityDidNotConverge(usize),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
