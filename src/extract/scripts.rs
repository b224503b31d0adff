//! Page-side extraction routines.
//!
//! Each constant is the source of a self-contained `async (args) => ...`
//! function. The worker pool injects it into the tab's DOM and calls it
//! with a single JSON argument; whatever it returns is deserialized into
//! the matching `schema` type. The routines have no access to the host
//! process.

/// Page extractor: expand collapsed sections, scroll everything into
/// existence, harvest text (PDF text layers preferred) and links.
///
/// Argument: `{ max_chars, allowed_hosts }`.
/// Returns [`super::schema::PageExtract`].
pub const PAGE_EXTRACTOR: &str = r#"
    async (args) => {
        const sleep = (ms) => new Promise((r) => setTimeout(r, ms));
        if (document.readyState !== 'complete') {
            await new Promise((r) => window.addEventListener('load', r, { once: true }));
        }

        const expandSelectors =
            '#expand_collapse_all, button[aria-expanded="false"], button[class*="expand"], .expand-collapse-all';
        for (let i = 0; i < 12; i++) {
            let clicked = 0;
            document.querySelectorAll(expandSelectors).forEach((el) => {
                const rect = el.getBoundingClientRect();
                if (rect.width > 0 && rect.height > 0) {
                    el.click();
                    clicked++;
                }
            });
            document.querySelectorAll('details:not([open])').forEach((d) => {
                d.open = true;
            });
            const master = document.querySelector('#expand_collapse_all');
            if (master && master.getAttribute('aria-expanded') === 'false') {
                master.click();
                clicked++;
            }
            if (clicked === 0) break;
            await sleep(150);
        }

        const scrollables = Array.from(document.querySelectorAll('*')).filter((el) => {
            const style = window.getComputedStyle(el);
            if (!/(auto|scroll)/.test(style.overflowY)) return false;
            return el.clientHeight > 200 && el.scrollHeight > el.clientHeight + 200;
        });
        const roots = [document.scrollingElement || document.documentElement]
            .concat(scrollables.slice(0, 8));
        for (const root of roots) {
            if (root.scrollHeight <= root.clientHeight + 50) continue;
            let last = -1;
            for (let i = 0; i < 20; i++) {
                root.scrollTop += Math.floor((root.clientHeight || window.innerHeight) * 0.8);
                await sleep(300);
                if (root.scrollHeight === last &&
                    root.scrollTop + root.clientHeight >= root.scrollHeight - 2) break;
                last = root.scrollHeight;
            }
            root.scrollTop = 0;
        }

        let text = '';
        const layerContainers = document.querySelectorAll('.TextLayer-container');
        if (layerContainers.length > 0) {
            const parts = [];
            layerContainers.forEach((c) => {
                c.querySelectorAll('.textLayer').forEach((l) => parts.push(l.innerText));
            });
            text = parts.join('\n');
        }
        if (!text.trim()) {
            text = document.body ? document.body.innerText : '';
        }
        text = text
            .replace(/[ \t]+/g, ' ')
            .replace(/[ ]*\n[ ]*/g, '\n')
            .replace(/\n{3,}/g, '\n\n')
            .trim();

        const allowed = new Set((args.allowed_hosts || []).map((h) => h.toLowerCase()));
        const fileExts = ['.pdf', '.doc', '.docx', '.ppt', '.pptx', '.xls', '.xlsx', '.csv', '.txt', '.md', '.rtf'];
        const seen = new Set();
        const links = [];
        document.querySelectorAll('a[href]').forEach((a) => {
            const href = a.getAttribute('href');
            if (!href || href.startsWith('#')) return;
            let abs;
            try {
                abs = new URL(href, window.location.href);
            } catch (e) {
                return;
            }
            if (abs.protocol !== 'http:' && abs.protocol !== 'https:') return;
            if (allowed.size > 0 && !allowed.has(abs.hostname.toLowerCase())) return;
            if (seen.has(abs.href)) return;
            seen.add(abs.href);
            const lowerPath = abs.pathname.toLowerCase();
            const is_file = lowerPath.includes('/files/')
                || lowerPath.includes('/download')
                || fileExts.some((ext) => lowerPath.endsWith(ext));
            links.push({
                url: abs.href,
                text: ((a.textContent || '') + ' ' + (a.getAttribute('title') || '')).trim().slice(0, 200),
                is_file,
            });
        });

        return {
            text: text.slice(0, args.max_chars),
            title: document.title || '',
            url: window.location.href,
            links,
        };
    }
"#;

/// File-viewer extractor: scroll the viewer (including same-origin
/// iframes) so lazy pages render, then take the cleaned body text.
///
/// Argument: `{ max_chars }`.
/// Returns [`super::schema::FileExtract`].
pub const FILE_VIEWER_EXTRACTOR: &str = r#"
    async (args) => {
        const sleep = (ms) => new Promise((r) => setTimeout(r, ms));
        if (document.readyState !== 'complete') {
            await new Promise((r) => window.addEventListener('load', r, { once: true }));
        }

        const scrollRoot = async (root) => {
            if (!root || root.scrollHeight <= root.clientHeight + 2) return;
            let last = -1;
            for (let i = 0; i < 20; i++) {
                root.scrollTop += Math.floor((root.clientHeight || 800) * 0.8);
                await sleep(300);
                if (root.scrollHeight === last &&
                    root.scrollTop + root.clientHeight >= root.scrollHeight - 2) break;
                last = root.scrollHeight;
            }
        };

        await scrollRoot(document.scrollingElement || document.documentElement);
        for (const el of document.querySelectorAll('.textLayer, .pdfViewer, .Pages, iframe')) {
            if (el.tagName === 'IFRAME') {
                let doc = null;
                try {
                    doc = el.contentDocument;
                } catch (e) {
                    doc = null;
                }
                if (doc) await scrollRoot(doc.scrollingElement || doc.documentElement);
            } else {
                await scrollRoot(el);
            }
        }

        let text = '';
        if (document.body) {
            const clone = document.body.cloneNode(true);
            clone.querySelectorAll('script, style, noscript, nav, header, footer').forEach((n) => n.remove());
            const holder = document.createElement('div');
            holder.style.display = 'none';
            holder.appendChild(clone);
            document.documentElement.appendChild(holder);
            text = holder.innerText || holder.textContent || '';
            holder.remove();
        }
        text = text
            .replace(/[ \t]+/g, ' ')
            .replace(/[ ]*\n[ ]*/g, '\n')
            .replace(/\n{3,}/g, '\n\n')
            .trim();

        let filename = '';
        const heading = document.querySelector('h1, h2');
        if (heading && heading.textContent.trim()) {
            filename = heading.textContent.trim();
        }
        if (!filename) {
            const segments = window.location.pathname.split('/').filter(Boolean);
            filename = segments.length
                ? decodeURIComponent(segments[segments.length - 1])
                : window.location.hostname;
        }

        return {
            text: text.slice(0, args.max_chars),
            filename: filename.slice(0, 300),
            url: window.location.href,
        };
    }
"#;

/// Module-prefetch extractor: run once per course against `/modules`,
/// expanding every collapsible section so file links hidden behind them
/// become harvestable.
///
/// Argument: `{ allowed_hosts }`.
/// Returns [`super::schema::ModulePrefetch`].
pub const MODULE_PREFETCH: &str = r#"
    async (args) => {
        const sleep = (ms) => new Promise((r) => setTimeout(r, ms));
        if (document.readyState !== 'complete') {
            await new Promise((r) => window.addEventListener('load', r, { once: true }));
        }

        const expandSelectors =
            '#expand_collapse_all, button[aria-expanded="false"], button[class*="expand"], .expand-collapse-all';
        for (let i = 0; i < 12; i++) {
            let clicked = 0;
            document.querySelectorAll(expandSelectors).forEach((el) => {
                const rect = el.getBoundingClientRect();
                if (rect.width > 0 && rect.height > 0) {
                    el.click();
                    clicked++;
                }
            });
            document.querySelectorAll('details:not([open])').forEach((d) => {
                d.open = true;
            });
            if (clicked === 0) break;
            await sleep(150);
        }

        const allowed = new Set((args.allowed_hosts || []).map((h) => h.toLowerCase()));
        const fileExts = ['.pdf', '.doc', '.docx', '.ppt', '.pptx', '.xls', '.xlsx', '.csv', '.txt', '.md', '.rtf'];
        const seen = new Set();
        const links = [];
        document.querySelectorAll('a[href]').forEach((a) => {
            const href = a.getAttribute('href');
            if (!href || href.startsWith('#')) return;
            let abs;
            try {
                abs = new URL(href, window.location.href);
            } catch (e) {
                return;
            }
            if (abs.protocol !== 'http:' && abs.protocol !== 'https:') return;
            if (allowed.size > 0 && !allowed.has(abs.hostname.toLowerCase())) return;
            const lowerPath = abs.pathname.toLowerCase();
            const looksLikeFile = lowerPath.includes('/files/')
                || lowerPath.includes('/download')
                || fileExts.some((ext) => lowerPath.endsWith(ext));
            if (!looksLikeFile) return;
            if (seen.has(abs.href)) return;
            seen.add(abs.href);
            links.push({
                url: abs.href,
                text: ((a.textContent || '') + ' ' + (a.getAttribute('title') || '')).trim().slice(0, 200),
                is_file: true,
            });
        });

        return { links };
    }
"#;

/// Dashboard course-list extractor: every distinct `/courses/<id>` link
/// with its display name.
///
/// Argument: `{}`. Returns an array of [`super::schema::CourseLink`].
pub const COURSE_LIST: &str = r#"
    async (args) => {
        if (document.readyState !== 'complete') {
            await new Promise((r) => window.addEventListener('load', r, { once: true }));
        }

        const seen = new Set();
        const courses = [];
        document.querySelectorAll('a[href*="/courses/"]').forEach((a) => {
            let abs;
            try {
                abs = new URL(a.getAttribute('href'), window.location.href);
            } catch (e) {
                return;
            }
            const match = abs.pathname.match(/^\/courses\/(\d+)\/?$/);
            if (!match) return;
            if (seen.has(match[1])) return;
            seen.add(match[1]);
            courses.push({
                id: match[1],
                name: (a.textContent || '').trim().slice(0, 200),
                url: abs.href,
            });
        });
        return courses;
    }
"#;
