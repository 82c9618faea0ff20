//! Server-rendered front-end page
//!
//! A single page in two modes. Without a selected spectrum it shows a lookup
//! form; once a spectrum is selected it loads `/data` and draws a d3 force
//! layout: node label = spectrum id, tooltip = display name, link label =
//! similarity, link distance = 75 / similarity.

/// What the index page should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMode<'a> {
    /// No spectrum selected yet
    Idle,
    /// `spectrum_id` was fetched and stored; draw its graph
    Run {
        /// Selected spectrum
        spectrum_id: &'a str,
    },
    /// Selecting a spectrum failed
    Failed {
        /// Spectrum that was requested
        spectrum_id: &'a str,
        /// Error shown to the user
        message: &'a str,
    },
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn lookup_form(value: &str) -> String {
    format!(
        r#"<form method="get" action="/">
  <input type="text" name="spectrum_id" placeholder="CCMSLIB00000001547" value="{}">
  <button type="submit">Build network</button>
</form>"#,
        escape_html(value)
    )
}

const STYLE: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; margin: 0; padding: 1rem 2rem; color: #222; }
h1 { font-size: 1.4rem; }
form input { padding: 0.4rem; width: 20rem; }
form button { padding: 0.4rem 1rem; }
.error { color: #b00020; }
.link { stroke: #999; }
.nodeLabel { font-size: 10px; text-anchor: middle; pointer-events: none; }
.linkLabel { font-size: 9px; text-anchor: middle; }
#divSVG { width: 100%; }
"#;

const GRAPH_SCRIPT: &str = r##"
var idNames = {};

function getName(id) { return idNames[id] || id; }

function drawGraph(data) {
  idNames = data.idNames || {};
  var nodes = data.nodes.slice();
  var links = data.edges.map(function (e) {
    return { similarity: e.similarity, source: nodes[e.source], target: nodes[e.target] };
  });

  var height = window.innerHeight - 200;
  var svg = d3.select("#divSVG").append("svg").attr("width", "100%").attr("height", height);
  svg.html('<defs><filter x="-0.1" y="0" width="1.2" height="1" id="solid"><feFlood flood-color="white"/><feComposite in="SourceGraphic"/></filter></defs>');

  var force = d3.layout.force()
    .nodes(nodes)
    .links(links)
    .charge(-1e3)
    .linkDistance(function (l) { return 1 / parseFloat(l.similarity) * 75; })
    .size([document.getElementById("divSVG").clientWidth, height]);

  var link = svg.selectAll(".link").data(links).enter().append("line")
    .attr("class", "link").style("stroke-width", 1);
  var linkLabel = svg.selectAll(".linkLabel").data(links).enter().append("text")
    .attr("class", "linkLabel").attr("dy", 5).attr("filter", "url(#solid)")
    .text(function (l) { return l.similarity; });

  var node = svg.selectAll(".node").data(nodes).enter().append("g")
    .attr("class", "node")
    .call(force.drag)
    .on("mousedown", function (d) { d.fixed = true; });
  node.append("circle").attr("r", 20).attr("fill", "#e48768")
    .append("svg:title").text(function (d) { return getName(d.id); });
  node.append("text").attr("class", "nodeLabel").attr("y", 5)
    .text(function (d) { return d.id; });

  force.on("tick", function () {
    link.attr("x1", function (d) { return d.source.x; })
        .attr("y1", function (d) { return d.source.y; })
        .attr("x2", function (d) { return d.target.x; })
        .attr("y2", function (d) { return d.target.y; });
    linkLabel.attr("transform", function (d) {
      var angle = Math.atan((d.source.y - d.target.y) / (d.source.x - d.target.x)) * 180 / Math.PI;
      return "translate(" + [(d.source.x + d.target.x) / 2, (d.source.y + d.target.y) / 2] + ")rotate(" + angle + ")";
    });
    node.attr("transform", function (d) { return "translate(" + [d.x, d.y] + ")"; });
  });
  force.start();
}

fetch("/data")
  .then(function (resp) {
    return resp.json().then(function (body) {
      if (!resp.ok) { throw new Error(body.error + (body.help ? " (" + body.help + ")" : "")); }
      return body;
    });
  })
  .then(drawGraph)
  .catch(function (err) {
    document.getElementById("status").textContent = err.message;
    document.getElementById("status").className = "error";
  });
"##;

/// Render the index page.
pub fn render_index(title: &str, mode: &PageMode<'_>) -> String {
    let body = match mode {
        PageMode::Idle => format!(
            "<p>Enter a GNPS library spectrum id to build its similarity network.</p>\n{}",
            lookup_form("")
        ),
        PageMode::Run { spectrum_id } => format!(
            "{}\n<p id=\"status\">Matching <strong>{}</strong> and its nearest neighbours&hellip;</p>\n\
             <div id=\"divSVG\"></div>\n\
             <script src=\"https://d3js.org/d3.v3.min.js\"></script>\n<script>{}</script>",
            lookup_form(spectrum_id),
            escape_html(spectrum_id),
            GRAPH_SCRIPT
        ),
        PageMode::Failed { spectrum_id, message } => format!(
            "{}\n<p class=\"error\">Could not load <strong>{}</strong>: {}</p>",
            lookup_form(spectrum_id),
            escape_html(spectrum_id),
            escape_html(message)
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>"#,
        title = escape_html(title),
        style = STYLE,
        body = body
    )
}
