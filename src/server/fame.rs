use crate::common::models::UserId;
use crate::server::error::EngineResult;
use crate::server::social_graph::SocialGraphStore;

/// Round to 2 significant decimal digits. The coarse steps this produces
/// (2/3 and 66/100 both land on 0.67) are part of the contract.
pub fn two_sig_figs(value: f64) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    let exponent = value.abs().log10().floor();
    let factor = 10f64.powf(1.0 - exponent);
    (value * factor).round() / factor
}

/// Popularity score on [0, 1000]: ratio of distinct likers to viewers,
/// recomputed from the graph on every call.
pub async fn fame_rate(graph: &SocialGraphStore, user_id: UserId) -> EngineResult<i64> {
    let views = graph.count_views_of(user_id).await?;
    if views == 0 {
        return Ok(0);
    }
    let likes = graph.count_likes_of(user_id).await?;
    let ratio = likes as f64 / views as f64;
    Ok((two_sig_figs(ratio) * 1000.0).round() as i64)
}
