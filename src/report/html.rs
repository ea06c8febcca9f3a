//! HTML report generation using Tera templates

use crate::error::Result;
use crate::models::Severity;
use crate::report::{Frameworks, ReportData};
use std::path::Path;
use tera::{Context, Tera};
use tracing::info;

/// Renders report data to an HTML string
pub fn render(data: &ReportData) -> Result<String> {
    let template_path = "templates/report.html";
    let template_content =
        std::fs::read_to_string(template_path).unwrap_or_else(|_| default_template().to_string());

    let mut tera = Tera::default();
    tera.add_raw_template("report.html", &template_content)?;

    let mut context = Context::new();
    context.insert("target", &data.target);
    context.insert("scan_id", &data.scan_id);
    context.insert("scan_date", &data.scan_date);
    context.insert("state", &data.state.to_string());
    context.insert("error", &data.error);
    context.insert("engine_version", &data.engine_version);
    context.insert("phases", &data.phases);
    context.insert("findings", &data.vulnerabilities);
    context.insert("shown_findings", &data.vulnerabilities.len());
    context.insert("total_findings", &data.total_findings);
    context.insert("high_count", &data.summary.count(Severity::High));
    context.insert("medium_count", &data.summary.count(Severity::Medium));
    context.insert("low_count", &data.summary.count(Severity::Low));
    context.insert("info_count", &data.summary.count(Severity::Informational));
    context.insert("phase_notes", data.summary.phase_notes());
    context.insert("note", &data.summary.note());

    match &data.frameworks {
        Frameworks::Detected(fp) => {
            context.insert("technologies", &fp.technologies);
            context.insert("server", &fp.server);
            context.insert("framework", &fp.framework);
            context.insert("cms", &fp.cms);
            context.insert("languages", &fp.languages);
            context.insert("fingerprint_error", &Option::<String>::None);
        }
        Frameworks::Unavailable { error } => {
            context.insert("technologies", &Vec::<String>::new());
            context.insert("server", &Option::<String>::None);
            context.insert("framework", &Option::<String>::None);
            context.insert("cms", &Option::<String>::None);
            context.insert("languages", &Vec::<String>::new());
            context.insert("fingerprint_error", &Some(error));
        }
    }
    context.insert("version", env!("CARGO_PKG_VERSION"));

    Ok(tera.render("report.html", &context)?)
}

/// Generates an HTML report file
pub fn generate(data: &ReportData, output_path: &Path) -> Result<()> {
    let rendered = render(data)?;
    std::fs::write(output_path, rendered)?;
    info!("HTML report saved to {}", output_path.display());
    Ok(())
}

fn default_template() -> &'static str {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Security Scan Report - {{ target }}</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f1f5f9; color: #1e293b; line-height: 1.6; }
        .container { max-width: 1100px; margin: 0 auto; padding: 20px; }
        .header { background: #0f172a; color: white; padding: 32px 28px; border-radius: 10px; margin-bottom: 24px; }
        .header h1 { font-size: 1.8em; margin-bottom: 4px; }
        .header .meta { opacity: 0.7; font-size: 0.9em; }
        .alert { background: #fef2f2; border: 1px solid #fecaca; color: #991b1b; padding: 14px 20px; border-radius: 8px; margin-bottom: 20px; }
        .notes { background: #fffbeb; border: 1px solid #fde68a; color: #92400e; padding: 14px 20px; border-radius: 8px; margin-bottom: 20px; }
        .summary { display: grid; grid-template-columns: repeat(4, 1fr); gap: 14px; margin-bottom: 24px; }
        .card { background: white; padding: 22px 14px; border-radius: 10px; text-align: center; box-shadow: 0 1px 3px rgba(0,0,0,0.1); border-top: 4px solid #e2e8f0; }
        .card .count { font-size: 2.3em; font-weight: 800; }
        .card .label { font-size: 0.8em; text-transform: uppercase; letter-spacing: 1px; opacity: 0.7; }
        .card.high { border-top-color: #ea580c; } .card.high .count { color: #ea580c; }
        .card.medium { border-top-color: #ca8a04; } .card.medium .count { color: #ca8a04; }
        .card.low { border-top-color: #2563eb; } .card.low .count { color: #2563eb; }
        .card.informational { border-top-color: #6b7280; } .card.informational .count { color: #6b7280; }
        .section-title { font-size: 1.3em; font-weight: 700; margin: 26px 0 12px; padding-bottom: 8px; border-bottom: 2px solid #e2e8f0; }
        table { width: 100%; border-collapse: collapse; background: white; border-radius: 8px; overflow: hidden; font-size: 0.9em; }
        th, td { text-align: left; padding: 8px 12px; border-bottom: 1px solid #f1f5f9; }
        th { background: #f8fafc; }
        .finding { background: white; padding: 22px; border-radius: 10px; margin-bottom: 14px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); border-left: 4px solid #e2e8f0; }
        .finding.sev-high { border-left-color: #ea580c; }
        .finding.sev-medium { border-left-color: #ca8a04; }
        .finding.sev-low { border-left-color: #2563eb; }
        .finding.sev-informational { border-left-color: #6b7280; }
        .badge { display: inline-block; padding: 2px 10px; border-radius: 20px; color: white; font-size: 0.75em; font-weight: 700; text-transform: uppercase; margin-right: 8px; }
        .badge-high { background: #ea580c; }
        .badge-medium { background: #ca8a04; }
        .badge-low { background: #2563eb; }
        .badge-informational { background: #6b7280; }
        .finding p { margin: 6px 0; color: #475569; }
        .finding .label { font-weight: 600; color: #1e293b; }
        pre { background: #f8fafc; border: 1px solid #e2e8f0; padding: 12px; border-radius: 6px; font-size: 0.85em; white-space: pre-wrap; word-wrap: break-word; }
        .footer { text-align: center; padding: 26px; color: #94a3b8; font-size: 0.85em; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Web Security Scan Report</h1>
            <div class="meta">Target: {{ target }} | Scan ID: {{ scan_id }} | {{ scan_date }} | Status: {{ state }}{% if engine_version %} | Engine {{ engine_version }}{% endif %}</div>
        </div>
        {% if error %}<div class="alert"><strong>Scan error:</strong> {{ error }}</div>{% endif %}
        {% if phase_notes or note %}
        <div class="notes">
            {% for n in phase_notes %}<div>{{ n }}</div>{% endfor %}
            {% if note %}<div>{{ note }}</div>{% endif %}
        </div>
        {% endif %}
        <div class="summary">
            <div class="card high"><div class="count">{{ high_count }}</div><div class="label">High</div></div>
            <div class="card medium"><div class="count">{{ medium_count }}</div><div class="label">Medium</div></div>
            <div class="card low"><div class="count">{{ low_count }}</div><div class="label">Low</div></div>
            <div class="card informational"><div class="count">{{ info_count }}</div><div class="label">Informational</div></div>
        </div>
        {% if phases %}
        <div class="section-title">Scan Phases</div>
        <table>
            <tr><th>Phase</th><th>Outcome</th><th>Progress</th><th>Elapsed</th></tr>
            {% for p in phases %}<tr><td>{{ p.phase }}</td><td>{{ p.outcome }}</td><td>{{ p.progress }}%</td><td>{{ p.elapsed_secs }}s</td></tr>{% endfor %}
        </table>
        {% endif %}
        <div class="section-title">Detected Technologies</div>
        {% if fingerprint_error %}
        <p>Fingerprinting unavailable: {{ fingerprint_error }}</p>
        {% elif technologies %}
        <table>
            <tr><th>Name</th><th>Version</th><th>Confidence</th><th>Categories</th></tr>
            {% for t in technologies %}<tr><td>{{ t.name }}</td><td>{{ t.version }}</td><td>{{ t.confidence }}</td><td>{{ t.categories | join(sep=", ") }}</td></tr>{% endfor %}
        </table>
        <p>{% if server %}Server: {{ server }} {% endif %}{% if framework %}Framework: {{ framework }} {% endif %}{% if cms %}CMS: {{ cms }} {% endif %}{% if languages %}Languages: {{ languages | join(sep=", ") }}{% endif %}</p>
        {% else %}
        <p>No technologies detected.</p>
        {% endif %}
        <div class="section-title">Findings ({{ shown_findings }} of {{ total_findings }})</div>
        {% for finding in findings %}
        <div class="finding sev-{{ finding.severity }}">
            <h3><span class="badge badge-{{ finding.severity }}">{{ finding.severity }}</span>{{ finding.name }}</h3>
            <p>{{ finding.description }}</p>
            {% if finding.evidence %}<p><span class="label">Evidence:</span></p><pre>{{ finding.evidence }}</pre>{% endif %}
            {% if finding.remediation %}<p><span class="label">Remediation:</span> {{ finding.remediation }}</p>{% endif %}
            <p><span class="label">URL:</span> {{ finding.url }}{% if finding.param %} <span class="label">Parameter:</span> {{ finding.param }}{% endif %}</p>
        </div>
        {% endfor %}
        {% if total_findings == 0 %}
        <div class="finding"><h3>No findings reported</h3><p>The scan engine did not report any alerts for this target.</p></div>
        {% endif %}
        <div class="footer">Generated by Scanwarden v{{ version }} | {{ scan_date }}</div>
    </div>
</body>
</html>"#
}
