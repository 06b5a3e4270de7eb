//! Digest email rendering.
//!
//! Produces the subject line plus matching HTML and plain-text bodies
//! for one subscriber's digest. Articles are grouped under their topic
//! in the order the topics are given; topics with nothing new are left
//! out, and a digest with no articles at all gets the caught-up
//! placeholder instead of an empty shell.

use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};

use crate::dates::elapsed_between;
use crate::model::{Article, Topic};

/// Subject and both bodies for a single digest email.
#[derive(Debug, Clone)]
pub struct RenderedDigest {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Render a digest with the clock pinned to `now`.
#[must_use]
pub fn render_digest_at(topics: &[Topic], articles: &[Article], now: DateTime<Utc>) -> RenderedDigest {
    RenderedDigest {
        subject: digest_subject(now),
        html: render_html(topics, articles, now),
        text: render_text(topics, articles, now),
    }
}

/// Render a digest against the current clock.
#[must_use]
pub fn render_digest(topics: &[Topic], articles: &[Article]) -> RenderedDigest {
    render_digest_at(topics, articles, Utc::now())
}

/// "MM/DD - MM/DD" covering the 24 hours up to `end`.
#[must_use]
pub fn date_range_label(end: DateTime<Utc>) -> String {
    let start = end - Duration::hours(24);
    format!("{} - {}", start.format("%m/%d"), end.format("%m/%d"))
}

#[must_use]
pub fn digest_subject(now: DateTime<Utc>) -> String {
    format!("catchup on your topics ({})", date_range_label(now))
}

// ── HTML body ───────────────────────────────────────────────────────

#[must_use]
pub fn render_html(topics: &[Topic], articles: &[Article], now: DateTime<Utc>) -> String {
    let content = if articles.is_empty() {
        concat!(
            "<div class=\"snippet\">\n",
            "  📭 Looks like you're all caught up — no new updates for now.\n",
            "  <br />Check back later for fresh stories.\n",
            "</div>\n",
            "<div class=\"divider\"></div>",
        )
        .to_string()
    } else {
        render_topic_sections(topics, articles, now)
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="x-apple-disable-message-reformatting" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>catchup</title>
  <style>
    body {{ margin:0; padding:0; background:#f6f7f9; }}
    table {{ border-collapse:collapse; }}
    a {{ text-decoration:none; }}
    .wrap {{ width:100%; background:#f6f7f9; padding:24px 0; }}
    .container {{ width:100%; max-width:680px; margin:0 auto; background:#ffffff; border-radius:12px; }}
    .inner {{ padding:24px; }}
    .brand {{ font:800 18px/1.2 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#111; letter-spacing:.2px; text-transform: lowercase; }}
    .pre {{ font:400 13px/1.5 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#556; opacity:.9; margin:8px 0 0; }}
    .divider {{ height:1px; background:#eceff3; margin:16px 0; }}
    .topic {{ font:700 16px/1.3 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#111; margin:24px 0 8px; }}
    .article {{ padding:12px 0; }}
    .title {{ font:600 15px/1.35 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#0d47a1; }}
    .meta {{ font:500 12px/1.4 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#667085; margin-top:4px; }}
    .snippet {{ font:400 13px/1.6 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#2f3a4a; margin:6px 0 0; }}
    .softline {{ height:1px; background:#f1f3f6; margin:12px 0; }}
    .footer {{ font:400 12px/1.6 -apple-system,BlinkMacSystemFont,Segoe UI,Roboto,Helvetica,Arial,sans-serif; color:#7b8794; text-align:center; padding:16px 24px 0; }}
    @media (max-width: 480px) {{
      .inner {{ padding:18px; }}
      .container {{ border-radius:10px; }}
    }}
  </style>
</head>
<body>
  <table role="presentation" class="wrap" width="100%" cellpadding="0" cellspacing="0">
    <tr>
      <td align="center">
        <table role="presentation" class="container" cellpadding="0" cellspacing="0">
          <tr>
            <td class="inner">
              <div class="brand">catchup</div>
              <div class="pre">the latest updates on topics you care about</div>
              <div class="divider"></div>
              {content}
              <div class="footer">
                You're receiving this email because you subscribed to catchup.
                <br />Manage topics or unsubscribe anytime.
              </div>
            </td>
          </tr>
        </table>
        <div style="height:24px;"></div>
      </td>
    </tr>
  </table>
</body>
</html>"#
    )
}

fn render_topic_sections(topics: &[Topic], articles: &[Article], now: DateTime<Utc>) -> String {
    let mut sections = String::new();
    for (topic, topic_articles) in group_by_topic(topics, articles) {
        if topic_articles.is_empty() {
            continue;
        }
        let _ = write!(
            sections,
            "<div class=\"topic\">📢 {}</div>\n{}<div class=\"divider\"></div>\n",
            html_escape(&topic.name),
            render_articles(&topic_articles, now),
        );
    }
    sections
}

fn render_articles(articles: &[&Article], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for (idx, article) in articles.iter().enumerate() {
        let _ = write!(
            out,
            concat!(
                "<div class=\"article\">\n",
                "  <a class=\"title\" href=\"{url}\" target=\"_blank\" rel=\"noopener\">📄 {title}</a>\n",
                "  <div class=\"meta\">{source}{hours}</div>\n",
            ),
            url = html_escape(&article.url),
            title = html_escape(&article.title),
            source = html_escape(&article.source),
            hours = hours_ago_suffix(now, article.published_at),
        );
        if !article.snippet.is_empty() {
            let _ = writeln!(
                out,
                "  <p class=\"snippet\">{}</p>",
                html_escape(&article.snippet)
            );
        }
        out.push_str("</div>\n");
        if idx < articles.len() - 1 {
            out.push_str("<div class=\"softline\"></div>\n");
        }
    }
    out
}

/// " • ⏱️ {N}h ago" when at least one whole hour has passed. Articles
/// published in the future count as zero hours and get no suffix.
fn hours_ago_suffix(now: DateTime<Utc>, published_at: DateTime<Utc>) -> String {
    let hours = elapsed_between(now, published_at).hours.max(0);
    if hours > 0 {
        format!(" • ⏱️ {hours}h ago")
    } else {
        String::new()
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ── Plain-text body ─────────────────────────────────────────────────

#[must_use]
pub fn render_text(topics: &[Topic], articles: &[Article], now: DateTime<Utc>) -> String {
    let mut text = format!(
        "catchup — your last 24h updates ({})\n\n",
        date_range_label(now)
    );

    if articles.is_empty() {
        text.push_str(
            "📭 Looks like you're all caught up — no new updates for now.\nCheck back later for fresh stories.\n\n",
        );
    } else {
        for (topic, topic_articles) in group_by_topic(topics, articles) {
            if topic_articles.is_empty() {
                continue;
            }
            let _ = writeln!(text, "📢 {}", topic.name);
            for article in topic_articles {
                let _ = writeln!(text, "📄 {}", article.title);
                let _ = writeln!(text, "  {}", article.url);
                if !article.snippet.is_empty() {
                    let _ = writeln!(text, "  {}\n", article.snippet);
                }
            }
            text.push_str("\n\n");
        }
    }

    text.push_str(
        "You're receiving this email because you subscribed to catchup.\nManage preferences or unsubscribe anytime.",
    );
    text
}

/// Pair each topic with its articles, keeping topic order. Articles
/// whose topic is not in the list are dropped.
fn group_by_topic<'a>(
    topics: &'a [Topic],
    articles: &'a [Article],
) -> Vec<(&'a Topic, Vec<&'a Article>)> {
    topics
        .iter()
        .map(|topic| {
            let matched: Vec<&Article> = articles
                .iter()
                .filter(|article| article.topic_id == topic.id)
                .collect();
            (topic, matched)
        })
        .collect()
}
