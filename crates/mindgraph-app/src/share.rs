use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mindgraph_core::{FlatNode, Tree, TreeError, TreeNode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Share token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Share payload is not a valid tree: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Share payload failed validation: {0}")]
    Invalid(#[from] TreeError),
    #[error("URL carries no data parameter")]
    MissingData,
}

/// URL-safe token for a tree. Runtime layout state is not part of it.
///
/// The payload is the flat pre-order encoding, so any depth the builder accepts
/// can be decoded again.
pub fn encode_tree(root: &TreeNode) -> Result<String, ShareError> {
    let json = serde_json::to_vec(&root.flatten())?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode and validate a token. Ids inside are kept; callers re-key on adoption.
pub fn decode_tree(token: &str) -> Result<Tree, ShareError> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim().trim_end_matches('='))?;
    let nodes: Vec<FlatNode> = serde_json::from_slice(&bytes)?;
    let root = TreeNode::unflatten(nodes)?;
    Ok(Tree::from_root(root)?)
}

pub fn share_url(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}data={token}")
}

/// Pull the `data` query parameter out of a share URL.
pub fn token_from_url(url: &str) -> Result<&str, ShareError> {
    let (_, query) = url.split_once('?').ok_or(ShareError::MissingData)?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("data="))
        .filter(|token| !token.is_empty())
        .ok_or(ShareError::MissingData)
}
