//! Utility functions

/// Last `:`-separated segment of an ARN
///
/// `arn:aws:rds:us-east-1:111111111111:db:mydb-1` yields `mydb-1`.
pub fn arn_resource_name(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}

/// Whether an RDS ARN names a cluster rather than an instance
pub fn is_cluster_arn(arn: &str) -> bool {
    arn.contains("cluster")
}
