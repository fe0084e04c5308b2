//! HTML shells for the dashboard pages. Each shell fetches its page model
//! from the JSON API with the browser's query string and draws the figures
//! with Plotly.

/// Pages in navigation order: (path, title, api endpoint).
pub const PAGES: [(&str, &str, &str); 4] = [
    ("/", "Overview", "/api/overview"),
    ("/univariate", "Univariate Analysis", "/api/univariate"),
    ("/bivariate", "Bivariate Analysis", "/api/bivariate"),
    ("/exploration", "Data Exploration", "/api/exploration"),
];

const TEMPLATE: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{title}} | Building Permits</title>
<script src="https://cdn.plot.ly/plotly-2.35.2.min.js"></script>
<style>
  body { font-family: system-ui, sans-serif; margin: 0; background: #f7f8fa; color: #1f2933; }
  nav { background: #243b53; padding: 0.75rem 1.5rem; }
  nav a { color: #d9e2ec; margin-right: 1.25rem; text-decoration: none; }
  nav a.active { color: #fff; font-weight: 600; }
  main { padding: 1.5rem; }
  form { margin-bottom: 1rem; }
  form input { width: 32rem; padding: 0.3rem; }
  .metrics { display: flex; gap: 1rem; flex-wrap: wrap; }
  .metric { background: #fff; border-radius: 6px; padding: 0.75rem 1rem; min-width: 10rem; }
  .metric b { display: block; font-size: 1.4rem; }
  .figure { background: #fff; border-radius: 6px; margin: 1rem 0; min-height: 420px; }
  table { border-collapse: collapse; background: #fff; margin: 1rem 0; font-size: 0.85rem; }
  td, th { border: 1px solid #d9e2ec; padding: 0.25rem 0.5rem; text-align: left; }
  .error { background: #ffe3e3; color: #8a1c1c; padding: 1rem; border-radius: 6px; }
</style>
</head>
<body>
<nav>{{nav}}</nav>
<main>
<h1>{{title}}</h1>
<form id="controls">
  <input name="q" placeholder="dataset=raw&amp;column=Estimated Cost" value="">
  <button type="submit">Render</button>
</form>
<div id="content">Loading...</div>
</main>
<script>
const API = "{{api}}";

function axisLayout(title, x, y) {
  return { title: title, xaxis: { title: x }, yaxis: { title: y }, template: "plotly_white",
           margin: { l: 60, r: 20, t: 50, b: 120 } };
}

function toPlotly(fig) {
  switch (fig.kind) {
    case "histogram":
      return [[{ type: "bar", x: fig.bins.map(b => (b.start + b.end) / 2), y: fig.bins.map(b => b.count),
                 width: fig.bins.map(b => b.end - b.start) }], axisLayout(fig.title, fig.x_label, "count")];
    case "box":
      return [fig.groups.map(g => ({ type: "box", name: g.category || fig.y_label,
                 q1: [g.q1], median: [g.median], q3: [g.q3], lowerfence: [g.lower_whisker],
                 upperfence: [g.upper_whisker], x: g.category ? [g.category] : undefined,
                 legendgroup: g.color })), axisLayout(fig.title, fig.x_label || "", fig.y_label)];
    case "bar": {
      const horizontal = fig.orientation === "horizontal";
      const traces = fig.series.map(s => ({ type: "bar", name: s.name,
                 orientation: horizontal ? "h" : "v",
                 x: horizontal ? s.values : fig.categories, y: horizontal ? fig.categories : s.values,
                 text: fig.text_auto ? s.values : undefined }));
      const layout = horizontal ? axisLayout(fig.title, fig.value_label, fig.category_label)
                                : axisLayout(fig.title, fig.category_label, fig.value_label);
      layout.barmode = fig.mode;
      return [traces, layout];
    }
    case "pie":
      return [[{ type: "pie", labels: fig.labels, values: fig.values }], { title: fig.title }];
    case "scatter":
      return [[{ type: "scattergl", mode: "markers", x: fig.points.map(p => p.x), y: fig.points.map(p => p.y),
                 text: fig.points.map(p => p.color), opacity: fig.opacity, marker: { size: 6 } }],
              axisLayout(fig.title, fig.x_label, fig.y_label)];
    case "density_heatmap":
      return [[{ type: "heatmap", z: fig.counts, x: fig.x_edges.slice(0, -1), y: fig.y_edges.slice(0, -1),
                 colorscale: "Viridis" }], axisLayout(fig.title, fig.x_label, fig.y_label)];
    case "crosstab_heatmap":
      return [[{ type: "heatmap", z: fig.counts, x: fig.x_categories, y: fig.y_categories, colorscale: "Blues",
                 texttemplate: fig.text_auto ? "%{z}" : undefined }], axisLayout(fig.title, fig.x_label, fig.y_label)];
    case "line":
      return [[{ type: "scatter", mode: fig.markers ? "lines+markers" : "lines",
                 x: fig.points.map(p => p.x), y: fig.points.map(p => p.y) }],
              axisLayout(fig.title, fig.x_label, fig.y_label)];
    case "correlation_heatmap":
      return [[{ type: "heatmap", z: fig.matrix, x: fig.columns, y: fig.columns, colorscale: "RdBu",
                 zmid: 0, zmin: -1, zmax: 1 }], { title: fig.title, height: 600 }];
  }
  return [[], { title: "Unsupported figure " + fig.kind }];
}

function isFigure(v) { return v && typeof v === "object" && typeof v.kind === "string"; }
function isTable(v) { return v && Array.isArray(v.columns) && Array.isArray(v.rows); }

function renderTable(rows) {
  const table = document.createElement("table");
  if (isTable(rows)) {
    table.innerHTML = "<tr>" + rows.columns.map(c => "<th>" + c + "</th>").join("") + "</tr>" +
      rows.rows.map(r => "<tr>" + r.map(v => "<td>" + (v === null ? "" : v) + "</td>").join("") + "</tr>").join("");
  } else {
    const keys = Object.keys(rows[0]);
    table.innerHTML = "<tr>" + keys.map(k => "<th>" + k + "</th>").join("") + "</tr>" +
      rows.map(r => "<tr>" + keys.map(k => "<td>" + JSON.stringify(r[k]) + "</td>").join("") + "</tr>").join("");
  }
  return table;
}

function render(value, into, name) {
  if (isFigure(value)) {
    const div = document.createElement("div");
    div.className = "figure";
    into.appendChild(div);
    const [traces, layout] = toPlotly(value);
    Plotly.newPlot(div, traces, layout, { responsive: true });
  } else if (isTable(value) || (Array.isArray(value) && value.length && typeof value[0] === "object")) {
    const h = document.createElement("h3");
    h.textContent = name;
    into.appendChild(h);
    into.appendChild(renderTable(value));
  } else if (value && typeof value === "object" && !Array.isArray(value)) {
    const scalars = Object.entries(value).filter(([, v]) => v === null || typeof v !== "object");
    if (scalars.length) {
      const box = document.createElement("div");
      box.className = "metrics";
      box.innerHTML = scalars.map(([k, v]) => "<div class='metric'>" + k + "<b>" + v + "</b></div>").join("");
      into.appendChild(box);
    }
    Object.entries(value).filter(([, v]) => v !== null && typeof v === "object")
      .forEach(([k, v]) => render(v, into, k));
  }
}

async function load() {
  const content = document.getElementById("content");
  const query = window.location.search;
  document.querySelector("#controls input").value = query.replace(/^\?/, "");
  try {
    const resp = await fetch(API + query);
    const body = await resp.json();
    content.innerHTML = "";
    if (!resp.ok) {
      content.innerHTML = "<div class='error'>" + body.code + ": " + body.message + "</div>";
      return;
    }
    render(body, content, "");
  } catch (err) {
    content.innerHTML = "<div class='error'>" + err + "</div>";
  }
}

document.getElementById("controls").addEventListener("submit", ev => {
  ev.preventDefault();
  const q = ev.target.q.value.trim();
  window.location.search = q ? "?" + q : "";
});
load();
</script>
</body>
</html>
"##;

/// The shell for one page, with `active` highlighted in the navigation.
pub fn render(active: &str) -> String {
    let (_, title, api) = PAGES
        .iter()
        .find(|(path, _, _)| *path == active)
        .copied()
        .unwrap_or(PAGES[0]);

    let nav: String = PAGES
        .iter()
        .map(|(path, name, _)| {
            let class = if *path == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{}\"{}>{}</a>", path, class, name)
        })
        .collect();

    TEMPLATE
        .replace("{{nav}}", &nav)
        .replace("{{title}}", title)
        .replace("{{api}}", api)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_points_at_its_api() {
        let html = render("/bivariate");
        assert!(html.contains("const API = \"/api/bivariate\";"));
        assert!(html.contains("<a href=\"/bivariate\" class=\"active\">Bivariate Analysis</a>"));
        assert!(html.contains("<a href=\"/\">Overview</a>"));
        assert!(!html.contains("{{"));
    }
}
