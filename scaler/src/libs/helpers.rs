/// Get the name of a cluster from its arn
///
/// Anything that is not an arn is assumed to already be a name.
///
/// # Arguments
///
/// * `arn` - The arn of the cluster
pub fn cluster_name(arn: &str) -> String {
    // cluster arns look like arn:aws:ecs:<region>:<account>:cluster/<name>
    match arn.split_once(":cluster/") {
        Some((_, name)) => name.to_owned(),
        None => arn.to_owned(),
    }
}

/// Clamp a count from an AWS response to an unsigned value
///
/// Missing or negative counts are treated as zero.
///
/// # Arguments
///
/// * `raw` - The raw count to clamp
pub fn count<T: Into<Option<i32>>>(raw: T) -> u32 {
    raw.into()
        .and_then(|raw| u32::try_from(raw).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_names_come_from_arns() {
        assert_eq!(
            cluster_name("arn:aws:ecs:us-east-1:123456789012:cluster/prod-web"),
            "prod-web"
        );
        assert_eq!(cluster_name("prod-web"), "prod-web");
    }

    #[test]
    fn counts_clamp_to_zero() {
        assert_eq!(count(4), 4);
        assert_eq!(count(-2), 0);
        assert_eq!(count(None::<i32>), 0);
        assert_eq!(count(Some(7)), 7);
    }
}
