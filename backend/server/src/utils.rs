use ledger::payloads::AdIdsRequest;

use crate::error::AppError::{self, BatchTooLarge, MalformedPayload};

/// Normalizes the requested ids. Order and duplicates are kept so that every
/// requested id gets exactly one result.
pub fn get_ad_ids(request: AdIdsRequest, max_batch_size: usize) -> Result<Vec<String>, AppError> {
    let ad_ids: Vec<String> = request
        .into_ids()
        .into_iter()
        .map(|id| id.trim().to_string())
        .collect();

    if ad_ids.is_empty() {
        return Err(MalformedPayload("adId or adIds is required".to_string()));
    }

    if ad_ids.iter().any(String::is_empty) {
        return Err(MalformedPayload("ad ids must be non-empty strings".to_string()));
    }

    if ad_ids.len() > max_batch_size {
        return Err(BatchTooLarge {
            count: ad_ids.len(),
            limit: max_batch_size,
        });
    }

    Ok(ad_ids)
}
