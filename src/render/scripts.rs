//! Page scripts evaluated by the capture protocol

/// Evaluates to true once no script-issued requests are outstanding
pub const QUIESCENCE_CHECK: &str = r#"(() => {
    const jqueryIdle = typeof window.jQuery === 'undefined' || window.jQuery.active === 0;
    const pending = (window.__archiverPendingXhr || 0) + (window.__archiverPendingFetch || 0);
    return jqueryIdle && pending === 0;
})()"#;

/// Counts in-flight XHR and fetch requests from here on; safe to run twice
pub const INSTALL_REQUEST_TRACKERS: &str = r#"(() => {
    if (window.__archiverTrackersInstalled) {
        return true;
    }
    window.__archiverTrackersInstalled = true;
    window.__archiverPendingXhr = 0;
    window.__archiverPendingFetch = 0;

    const originalSend = XMLHttpRequest.prototype.send;
    XMLHttpRequest.prototype.send = function (...args) {
        window.__archiverPendingXhr += 1;
        this.addEventListener('loadend', () => {
            window.__archiverPendingXhr = Math.max(0, window.__archiverPendingXhr - 1);
        });
        return originalSend.apply(this, args);
    };

    if (typeof window.fetch === 'function') {
        const originalFetch = window.fetch;
        window.fetch = function (...args) {
            window.__archiverPendingFetch += 1;
            return originalFetch.apply(this, args).finally(() => {
                window.__archiverPendingFetch = Math.max(0, window.__archiverPendingFetch - 1);
            });
        };
    }
    return true;
})()"#;

/// Resource timing entries as `[{url, initiator}]`
pub const NETWORK_LOG: &str = r#"(() => performance.getEntriesByType('resource').map((entry) => ({
    url: entry.name,
    initiator: entry.initiatorType || ''
})))()"#;
