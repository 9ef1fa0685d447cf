//! In-page DOM purge and the normalization applied before the DOM leaves
//! the capture worker.

use crate::text::{escape_non_ascii, truncate_chars};

/// Expression evaluated in the rendered page. Works on a clone of the
/// document element and returns its reduced `outerHTML`:
/// drops `script`/`noscript`, flattens `style` into text nodes, strips
/// comments, and removes `data-*` and `on*` attributes.
pub const PURGE_SCRIPT: &str = r#"(() => {
  const clone = document.documentElement.cloneNode(true);

  clone.querySelectorAll('script, noscript').forEach(n => n.remove());

  clone.querySelectorAll('style').forEach(st => {
    st.replaceWith(document.createTextNode(st.textContent || ''));
  });

  const walker = document.createTreeWalker(clone, NodeFilter.SHOW_COMMENT);
  const comments = [];
  while (walker.nextNode()) comments.push(walker.currentNode);
  comments.forEach(c => c.remove());

  clone.querySelectorAll('*').forEach(el => {
    [...el.attributes].forEach(attr => {
      if (attr.name.startsWith('data-') || attr.name.startsWith('on')) {
        el.removeAttribute(attr.name);
      }
    });
  });

  return clone.outerHTML;
})()"#;

/// Expression reporting load progress, polled while waiting for the
/// network to go quiet.
pub const NETWORK_PROBE_SCRIPT: &str = r#"(() => ({
  ready: document.readyState,
  resources: performance.getEntriesByType('resource').length
}))()"#;

/// Cap the DOM at `char_limit` characters and make it ASCII-only.
pub fn normalize_dom(dom: &str, char_limit: usize) -> String {
    escape_non_ascii(truncate_chars(dom, char_limit))
}
