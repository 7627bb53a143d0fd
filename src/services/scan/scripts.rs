// src/services/scan/scripts.rs

//! In-page scripts evaluated during a scan pass.

/// `{ scrollWidth, innerWidth }` of the rendered document.
pub const VIEWPORT_METRICS: &str = r#"(() => ({
  scrollWidth: Math.max(
    document.documentElement ? document.documentElement.scrollWidth : 0,
    document.body ? document.body.scrollWidth : 0
  ),
  innerWidth: window.innerWidth
}))()"#;

pub const SCROLL_TO_BOTTOM: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0)";

pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0)";

/// Sources of loaded images with no intrinsic size.
pub const BROKEN_IMAGES: &str = r#"Array.from(document.images)
  .filter(img => img.complete && (img.naturalWidth === 0 || img.naturalHeight === 0) && (img.currentSrc || img.src))
  .map(img => img.currentSrc || img.src)"#;

/// Server request identifier embedded in the page, or `null`.
pub const REQUEST_ID: &str = r#"(() => {
  const meta = document.querySelector(
    'meta[name="request-id"], meta[name="x-request-id"], meta[name="trace-id"], meta[name="x-trace-id"]'
  );
  if (meta && meta.content) return meta.content;
  const tagged = document.querySelector('[data-request-id]');
  if (tagged) return tagged.getAttribute('data-request-id');
  for (const key of ['__REQUEST_ID__', 'requestId', 'REQUEST_ID', 'traceId']) {
    const value = window[key];
    if (typeof value === 'string' && value) return value;
  }
  return null;
})()"#;

pub const VISIBLE_TEXT: &str = "document.body ? document.body.innerText : ''";

/// Function source that counts items in the fullest matching container.
pub const COUNT_LIST_ITEMS_FN: &str = r#"(selectors) => {
  let best = 0;
  for (const selector of selectors) {
    let nodes;
    try { nodes = document.querySelectorAll(selector); } catch (e) { continue; }
    for (const node of nodes) {
      if (node.children.length > best) best = node.children.length;
    }
  }
  return best;
}"#;

/// Build the list item counting script for the configured container selectors.
pub fn count_list_items(selectors: &[String]) -> String {
    let args = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    format!("({COUNT_LIST_ITEMS_FN})({args})")
}
