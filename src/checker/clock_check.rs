use crate::command::TimingMetadata;
use crate::CheckError;

/// Verifies the intra-response clock invariant: the operation time a
/// response advertises never exceeds its cluster time.
pub fn verify_timing(timing: &TimingMetadata) -> std::result::Result<(), CheckError> {
    if timing.operation_time > timing.cluster_time {
        return Err(CheckError::ClockRegression {
            operation_time: timing.operation_time.to_string(),
            cluster_time: timing.cluster_time.to_string(),
        });
    }
    Ok(())
}
