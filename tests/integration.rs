//! Integration tests for the Quire crate.
//!
//! These tests run the full pipeline from an empty book to a written
//! container and inspect the result with `zip`.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use quire::error::{Error, Result};
use quire::prelude::*;
use quire::types::Property;
use std::collections::HashSet;
use std::io::Cursor;
use zip::CompressionMethod;

mod common;
use common::{
    DUMMY_JPEG, DUMMY_PNG, entry_names, open_archive, open_archive_file, package_text,
    read_entry, setup_test_dir, write_file, write_to_memory,
};

#[tokio::test]
async fn test_end_to_end_package() -> Result<()> {
    let test_dir = setup_test_dir();
    let cover = test_dir.path().join("cover.png");
    write_file(&cover, DUMMY_PNG).await;

    let book = Book::new("T");
    book.add_introduction_md("Intro", "hello")?;
    book.add_chapter_md("Ch1", "a<!-- PAGE BREAK -->b")?;
    book.set_cover(&cover).await?;

    let dest = test_dir.path().join("t.epub");
    book.write(&dest).await?;

    let mut archive = open_archive_file(&dest).await;
    let names = entry_names(&mut archive);
    assert_eq!(
        names,
        vec![
            "mimetype",
            "META-INF/container.xml",
            "OEBPS/default.css",
            "OEBPS/images/img_cover.png",
            "OEBPS/text/cover.xhtml",
            "OEBPS/text/chapter001-0.xhtml",
            "OEBPS/text/chapter002-0.xhtml",
            "OEBPS/text/chapter002-1.xhtml",
            "OEBPS/text/nav.xhtml",
            "OEBPS/content.opf",
        ]
    );

    // Type declaration: first, stored, fixed content
    {
        let mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.compression(), CompressionMethod::Stored);
    }
    assert_eq!(read_entry(&mut archive, "mimetype"), "application/epub+zip");

    let container = read_entry(&mut archive, "META-INF/container.xml");
    assert!(container.contains(r#"full-path="OEBPS/content.opf""#));

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:title>T</dc:title>"));
    assert!(opf.contains(
        r#"<item id="img_cover.png" href="images/img_cover.png" media-type="image/png" properties="cover-image"/>"#
    ));
    assert!(opf.contains(
        r#"<item id="nav" href="text/nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#
    ));
    assert!(opf.contains(r#"<item id="default.css" href="default.css" media-type="text/css"/>"#));
    assert!(opf.contains(r#"<meta name="cover" content="img_cover.png"/>"#));
    assert!(!opf.contains(r#"href="content.opf""#));

    let intro = opf.find(r#"<itemref idref="chapter001-0.xhtml"/>"#).unwrap();
    let ch1_a = opf.find(r#"<itemref idref="chapter002-0.xhtml"/>"#).unwrap();
    let ch1_b = opf.find(r#"<itemref idref="chapter002-1.xhtml"/>"#).unwrap();
    assert!(intro < ch1_a && ch1_a < ch1_b);

    let nav = read_entry(&mut archive, "OEBPS/text/nav.xhtml");
    assert!(nav.contains(r#"<li class="introduction"><a href="chapter001-0.xhtml">Intro</a></li>"#));
    assert!(nav.contains(r#"<li class="chapter"><a href="chapter002-0.xhtml">Ch1</a></li>"#));
    assert!(nav.contains(r#"href="cover.xhtml""#));

    let first = read_entry(&mut archive, "OEBPS/text/chapter002-0.xhtml");
    let second = read_entry(&mut archive, "OEBPS/text/chapter002-1.xhtml");
    assert!(first.contains(r#"<h1 class="section-title">Ch1</h1>"#));
    assert!(first.contains("<p>a</p>"));
    assert!(!second.contains("section-title"));
    assert!(second.contains("<p>b</p>"));
    assert!(second.contains(r#"href="../default.css""#));

    let cover_page = read_entry(&mut archive, "OEBPS/text/cover.xhtml");
    assert!(cover_page.contains(r#"src="../images/img_cover.png""#));
    Ok(())
}

#[tokio::test]
async fn test_package_records() -> Result<()> {
    let book = Book::new("Records");
    book.add_postscript_html("Afterword", vec!["<p>bye</p>".to_string()]);
    book.add_chapter_md("Body", "one<!-- PAGE BREAK -->two<!-- PAGE BREAK -->three")?;
    book.add_introduction_html("Foreword", vec!["<p>hi</p>".to_string()]);
    book.set_cover_bytes("c.jpg", DUMMY_JPEG.to_vec())?;

    let package = book.assemble()?;

    let spine: Vec<&str> = package.spine().iter().map(|s| s.idref.as_str()).collect();
    assert_eq!(
        spine,
        vec![
            "cover-page",
            "chapter001-0.xhtml",
            "chapter002-0.xhtml",
            "chapter002-1.xhtml",
            "chapter002-2.xhtml",
            "chapter003-0.xhtml",
        ]
    );

    let chapters = package.chapters();
    assert_eq!(chapters.len(), 3);
    assert_eq!(
        chapters
            .iter()
            .map(|c| (c.id, c.title.as_str(), c.kind))
            .collect::<Vec<_>>(),
        vec![
            (1, "Foreword", Tier::FrontMatter),
            (2, "Body", Tier::Body),
            (3, "Afterword", Tier::BackMatter),
        ]
    );
    assert_eq!(chapters[1].path, "OEBPS/text/chapter002-0.xhtml");
    assert_eq!(chapters[1].href, "chapter002-0.xhtml");
    assert_eq!(chapters[1].nav_point, "navPoint-2");

    let cover = package
        .manifest()
        .iter()
        .find(|e| e.properties == Some(Property::CoverImage))
        .unwrap();
    assert_eq!(cover.path, "OEBPS/images/img_cover.jpg");
    assert_eq!(cover.media_type, "image/jpeg");

    let nav: Vec<&ManifestEntry> = package
        .manifest()
        .iter()
        .filter(|e| e.properties == Some(Property::Nav))
        .collect();
    assert_eq!(nav.len(), 1);

    let last = package.manifest().last().unwrap();
    assert_eq!(last.path, "OEBPS/content.opf");
    assert_eq!(last.media_type, "application/oebps-package+xml");

    // Every spine item names a manifest entry
    let ids: HashSet<&str> = package.manifest().iter().map(|e| e.id.as_str()).collect();
    assert!(spine.iter().all(|idref| ids.contains(idref)));
    Ok(())
}

#[tokio::test]
async fn test_manifest_ids_and_paths_are_unique() -> Result<()> {
    let book = Book::new("Unique");
    for i in 0..5 {
        book.add_image_bytes(&format!("fig {}.png", i), DUMMY_PNG.to_vec())?;
        book.add_chapter_md(&format!("Chapter {}", i), "x<!-- PAGE BREAK -->y")?;
    }
    book.add_font_bytes("body.ttf", vec![0; 4])?;
    book.add_asset_bytes("body.ttf", "font/ttf", vec![0; 4])?;

    let package = book.assemble()?;
    let manifest = package.manifest();
    let ids: HashSet<&str> = manifest.iter().map(|e| e.id.as_str()).collect();
    let paths: HashSet<&str> = manifest.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(ids.len(), manifest.len());
    assert_eq!(paths.len(), manifest.len());
    Ok(())
}

#[tokio::test]
async fn test_assembling_twice_is_identical() -> Result<()> {
    let book = Book::new("Twice");
    book.set_release_date(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    book.add_chapter_md("One", "# Heading\n\nText<!-- PAGE BREAK -->More")?;
    book.add_image_bytes("a.png", DUMMY_PNG.to_vec())?;

    let first = write_to_memory(&book);
    let second = write_to_memory(&book);
    assert_eq!(first, second);

    let mut archive = open_archive(first);
    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains("<dc:date>2024-03-01</dc:date>"));
    Ok(())
}

#[tokio::test]
async fn test_flat_layout_with_legacy_ncx() -> Result<()> {
    let config = BookConfig::builder()
        .metadata(BookMetadata {
            title: "Flat".to_string(),
            language: "ja".to_string(),
            ..Default::default()
        })
        .content_root("")
        .legacy_ncx(true)
        .compress_entries(false)
        .build()?;
    let book = Book::from_config(config);
    book.add_chapter_html("Only", vec!["<p>x</p>".to_string()]);

    let mut archive = open_archive(write_to_memory(&book));
    let names = entry_names(&mut archive);
    assert_eq!(
        names,
        vec![
            "mimetype",
            "META-INF/container.xml",
            "default.css",
            "text/chapter001-0.xhtml",
            "text/nav.xhtml",
            "toc.ncx",
            "content.opf",
        ]
    );
    for i in 0..archive.len() {
        assert_eq!(
            archive.by_index(i).unwrap().compression(),
            CompressionMethod::Stored
        );
    }

    let container = read_entry(&mut archive, "META-INF/container.xml");
    assert!(container.contains(r#"full-path="content.opf""#));

    let opf = read_entry(&mut archive, "content.opf");
    assert!(opf.contains(r#"<spine toc="ncx">"#));
    assert!(opf.contains(r#"xml:lang="ja""#));
    assert!(opf.contains(r#"href="toc.ncx""#));

    let ncx = read_entry(&mut archive, "toc.ncx");
    assert!(ncx.contains(r#"<navPoint id="navPoint-1" playOrder="1">"#));
    assert!(ncx.contains(r#"<content src="text/chapter001-0.xhtml"/>"#));
    Ok(())
}

#[tokio::test]
async fn test_add_image_folder() -> Result<()> {
    let test_dir = setup_test_dir();
    let folder = test_dir.path().join("pictures");
    write_file(&folder.join("b.png"), DUMMY_PNG).await;
    write_file(&folder.join("maps").join("c.jpg"), DUMMY_JPEG).await;
    write_file(&folder.join(".hidden.png"), DUMMY_PNG).await;
    write_file(&folder.join("notes.txt"), b"not an image").await;

    let book = Book::new("Folder");
    let added = book.add_image_folder(&folder).await?;
    assert_eq!(added, 2);
    assert_eq!(book.lookup_image("b.png").as_deref(), Some("../images/img_b.png"));
    assert_eq!(
        book.lookup_image("maps/c.jpg").as_deref(),
        Some("../images/img_maps_c.jpg")
    );
    assert!(book.lookup_image(".hidden.png").is_none());

    let package = book.assemble()?;
    let images: Vec<&str> = package
        .manifest()
        .iter()
        .filter(|e| e.media_type.starts_with("image/"))
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(
        images,
        vec!["OEBPS/images/img_b.png", "OEBPS/images/img_maps_c.jpg"]
    );

    // A second scan collides on the first name and stops there
    let err = book.add_image_folder(&folder).await.unwrap_err();
    assert!(matches!(err, Error::NamingCollision { .. }));
    Ok(())
}

#[tokio::test]
async fn test_missing_source_is_retrieval_error() {
    let test_dir = setup_test_dir();
    let book = Book::new("Missing");

    let err = book
        .add_image(test_dir.path().join("nope.png"), "nope.png")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SourceRetrieval { ref origin, .. } if origin.ends_with("nope.png")));

    let err = book
        .set_stylesheet(test_dir.path().join("nope.css"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SourceRetrieval { .. }));
    assert!(book.lookup_image("nope.png").is_none());
}

#[tokio::test]
async fn test_custom_stylesheet_and_assets_from_disk() -> Result<()> {
    let test_dir = setup_test_dir();
    let css = test_dir.path().join("style.css");
    let font = test_dir.path().join("Body Font.otf");
    write_file(&css, b"body { margin: 0; }").await;
    write_file(&font, b"OTTO").await;

    let book = Book::new("Styled");
    book.set_stylesheet(&css).await?;
    let href = book.add_font(&font, "Body Font.otf").await?;
    assert_eq!(href, "../fonts/Body_Font.otf");
    book.add_asset(&css, "raw.css", "text/css").await?;
    book.add_chapter_html("C", vec!["<p>x</p>".to_string()]);

    let package = book.assemble()?;
    assert!(package.entry_data("OEBPS/default.css").is_none());
    assert_eq!(
        package.entry_data("OEBPS/stylesheet.css"),
        Some(&b"body { margin: 0; }"[..])
    );
    assert_eq!(package.entry_data("OEBPS/fonts/Body_Font.otf"), Some(&b"OTTO"[..]));

    let chapter = package_text(&package, "OEBPS/text/chapter001-0.xhtml");
    assert!(chapter.contains(r#"href="../stylesheet.css""#));
    Ok(())
}

#[tokio::test]
async fn test_failed_write_leaves_no_file() -> Result<()> {
    let test_dir = setup_test_dir();
    let dest = test_dir.path().join("broken.epub");

    let book = Book::new("Broken");
    book.add_chapter_html("C", vec!["<p>x</p>".to_string()]);
    book.override_template("nav.xhtml", "{% for chapter in %}")?;

    let err = book.write(&dest).await.unwrap_err();
    assert!(matches!(err, Error::TemplateCompilation { ref template, .. } if template == "nav.xhtml"));
    assert!(!dest.exists());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_additions_keep_tier_order() -> Result<()> {
    let book = Arc::new(Book::new("Concurrent"));
    let mut handles = Vec::new();

    for i in 0..8 {
        let book = Arc::clone(&book);
        handles.push(tokio::spawn(async move {
            book.add_image_bytes(&format!("img{}.png", i), DUMMY_PNG.to_vec())?;
            if i % 2 == 0 {
                book.add_postscript_md(format!("Post {}", i), "p")
            } else {
                book.add_introduction_md(format!("Intro {}", i), "i")
            }
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let package = book.assemble()?;
    let kinds: Vec<Tier> = package.chapters().iter().map(|c| c.kind).collect();
    assert_eq!(&kinds[..4], &[Tier::FrontMatter; 4]);
    assert_eq!(&kinds[4..], &[Tier::BackMatter; 4]);

    let mut archive = open_archive(package.write_to(Cursor::new(Vec::new()))?.into_inner());
    assert_eq!(entry_names(&mut archive)[0], "mimetype");
    Ok(())
}

#[tokio::test]
async fn test_metadata_in_package_document() -> Result<()> {
    let config = BookConfig::builder()
        .metadata(BookMetadata::default_with_title("Fish & Chips"))
        .identifier("urn:isbn:9780000000000")
        .build()?;
    let book = Book::from_config(config);
    book.set_author("Ann <Writer>");
    book.set_publisher("Harbour Press");
    book.add_chapter_html("C", vec![]);

    let package = book.assemble()?;
    let opf = package_text(&package, "OEBPS/content.opf");
    assert!(opf.contains(r#"<dc:identifier id="BookId">urn:isbn:9780000000000</dc:identifier>"#));
    assert!(opf.contains("<dc:title>Fish &amp; Chips</dc:title>"));
    assert!(opf.contains("<dc:creator>Ann &lt;Writer&gt;</dc:creator>"));
    assert!(opf.contains("<dc:publisher>Harbour Press</dc:publisher>"));
    assert!(!opf.contains("<dc:description>"));

    let modified = book.current_date().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    assert!(opf.contains(&format!(
        r#"<meta property="dcterms:modified">{}</meta>"#,
        modified
    )));
    Ok(())
}

#[tokio::test]
async fn test_language_is_escaped_everywhere() -> Result<()> {
    let book = Book::new("Quoted");
    book.set_language(r#"en" onload="x"#);
    book.set_cover_bytes("front.png", DUMMY_PNG.to_vec())?;
    book.add_chapter_md("C", "text")?;

    let package = book.assemble()?;
    let escaped = "en&quot; onload=&quot;x";
    let opf = package_text(&package, "OEBPS/content.opf");
    assert!(opf.contains(&format!(r#"xml:lang="{}""#, escaped)));
    assert!(opf.contains(&format!("<dc:language>{}</dc:language>", escaped)));
    for path in [
        "OEBPS/text/chapter001-0.xhtml",
        "OEBPS/text/nav.xhtml",
        "OEBPS/text/cover.xhtml",
    ] {
        let page = package_text(&package, path);
        assert!(page.contains(&format!(r#"lang="{}""#, escaped)), "{path}");
        assert!(!page.contains(r#"onload="x""#), "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn test_image_folder_with_non_ascii_names() -> Result<()> {
    let test_dir = setup_test_dir();
    let folder = test_dir.path().join("巻一");
    write_file(&folder.join("表紙.png"), DUMMY_PNG).await;
    write_file(&folder.join("地図.png"), DUMMY_PNG).await;
    write_file(&folder.join("頁").join("001.jpg"), DUMMY_JPEG).await;

    let book = Book::new("Folder");
    assert_eq!(book.add_image_folder(&folder).await?, 3);
    assert_eq!(book.lookup_image("地図.png").as_deref(), Some("../images/img_地図.png"));
    assert_eq!(book.lookup_image("表紙.png").as_deref(), Some("../images/img_表紙.png"));
    assert_eq!(
        book.lookup_image("頁/001.jpg").as_deref(),
        Some("../images/img_頁_001.jpg")
    );

    let package = book.assemble()?;
    let ids: HashSet<&str> = package.manifest().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), package.manifest().len());
    Ok(())
}
