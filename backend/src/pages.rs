//! Landing page with the upload form, the last result and the live feed.

use shared::PredictResponse;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn result_section(result: Option<&PredictResponse>) -> String {
    let Some(result) = result else {
        return String::new();
    };
    format!(
        r#"<section id="result">
  <img src="{image}" alt="uploaded leaf" width="224">
  <h2>{prediction}</h2>
  <p>Confidence: {confidence:.2}%</p>
  <p>{description}</p>
  <form method="post" action="/delete">
    <input type="hidden" name="image_path" value="{image}">
    <button type="submit">Delete image</button>
  </form>
</section>"#,
        image = escape(&result.image_path),
        prediction = escape(&result.prediction),
        confidence = result.confidence,
        description = escape(&result.description),
    )
}

/// Renders `/`; `None` is the initial page with no prediction.
pub fn index(result: Option<&PredictResponse>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="id">
<head>
  <meta charset="utf-8">
  <title>Deteksi Penyakit Daun Bawang</title>
</head>
<body>
  <h1>Deteksi Penyakit Daun Bawang</h1>
  <form method="post" action="/predict" enctype="multipart/form-data">
    <input type="file" name="image" accept="image/*">
    <button type="submit">Predict</button>
  </form>
  {result}
  <h2>Kamera</h2>
  <img src="/video_feed" alt="live camera feed">
</body>
</html>
"#,
        result = result_section(result),
    )
}
