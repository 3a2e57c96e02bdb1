//! Files stored in the backup (`files.xml` plus content-addressed blobs).

use std::collections::BTreeMap;

use roxmltree::Document;

use crate::archive::ArchiveReader;
use crate::error::{ConvertError, Result};
use crate::record::{attribute, first_i64, first_text, get_all};

pub const FILES_MEMBER: &str = "files.xml";
pub const DATAFILE_AREA: &str = "datafile";
/// Where materialized images land, relative to the output root.
pub const IMAGE_DIR: &str = "assets/images";
/// How generated documents refer to [`IMAGE_DIR`].
pub const IMAGE_REFERENCE_DIR: &str = "images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub asset_id: String,
    /// Id of the record that owns the file (question, answer, match, ...).
    pub item_id: String,
    pub content_hash: String,
    pub file_path: String,
    pub file_name: String,
    pub file_area: String,
    pub file_size: u64,
    pub mime_type: String,
    pub time_created: i64,
    pub time_modified: i64,
}

impl Asset {
    pub fn from_record(file: roxmltree::Node) -> Result<Self> {
        let file_size = first_i64(file, "filesize")?;
        let file_size = u64::try_from(file_size).map_err(|_| ConvertError::InvalidNumber {
            tag: "filesize".to_string(),
            value: file_size.to_string(),
        })?;
        Ok(Self {
            asset_id: attribute(file, "id")?,
            item_id: first_text(file, "itemid")?.trim().to_string(),
            content_hash: first_text(file, "contenthash")?.trim().to_string(),
            file_path: first_text(file, "filepath")?,
            file_name: first_text(file, "filename")?,
            file_area: first_text(file, "filearea")?,
            file_size,
            mime_type: first_text(file, "mimetype")?,
            time_created: first_i64(file, "timecreated")?,
            time_modified: first_i64(file, "timemodified")?,
        })
    }

    /// Blob location inside the backup.
    pub fn storage_path(&self) -> String {
        let prefix = self.content_hash.get(..2).unwrap_or(&self.content_hash);
        format!("files/{}/{}", prefix, self.content_hash)
    }

    /// Path as written in `@@PLUGINFILE@@/...` links.
    pub fn relative_path(&self) -> String {
        format!("{}{}", self.file_path.trim_start_matches('/'), self.file_name)
    }

    /// Moodle records each directory as a file named `.`.
    pub fn is_directory(&self) -> bool {
        self.file_name == "."
    }
}

/// Resolves file references made by course content.
pub trait AssetResolver {
    /// Copy the file `relative_path` owned by `owner_id` into the output and
    /// return the path documents should use for it.
    fn locate_resource(&mut self, owner_id: &str, relative_path: &str) -> Result<String>;

    /// File name to text contents of every data file owned by `owner_id`.
    fn asset_contents(&mut self, owner_id: &str) -> Result<BTreeMap<String, String>>;
}

pub struct AssetManager<'a> {
    archive: &'a mut dyn ArchiveReader,
    assets: Vec<Asset>,
    materialized: BTreeMap<String, Vec<u8>>,
}

impl<'a> AssetManager<'a> {
    pub fn from_archive(archive: &'a mut dyn ArchiveReader) -> Result<Self> {
        let xml = archive.read_text(FILES_MEMBER)?;
        let document = Document::parse(&xml).map_err(|source| ConvertError::Xml {
            member: FILES_MEMBER.to_string(),
            source,
        })?;
        let assets = get_all(document.root(), "file")
            .into_iter()
            .map(Asset::from_record)
            .collect::<Result<Vec<_>>>()?;
        log::debug!("indexed {} stored files", assets.len());
        Ok(Self::new(archive, assets))
    }

    pub fn new(archive: &'a mut dyn ArchiveReader, assets: Vec<Asset>) -> Self {
        Self {
            archive,
            assets,
            materialized: BTreeMap::new(),
        }
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Output path to bytes for every file located so far.
    pub fn take_materialized(&mut self) -> BTreeMap<String, Vec<u8>> {
        std::mem::take(&mut self.materialized)
    }

    fn find(&self, owner_id: &str, relative_path: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| {
            asset.item_id == owner_id
                && !asset.is_directory()
                && asset.relative_path() == relative_path
        })
    }
}

impl AssetResolver for AssetManager<'_> {
    fn locate_resource(&mut self, owner_id: &str, relative_path: &str) -> Result<String> {
        let asset = self
            .find(owner_id, relative_path)
            .cloned()
            .ok_or_else(|| ConvertError::AssetNotFound {
                owner: owner_id.to_string(),
                path: relative_path.to_string(),
            })?;

        let base_name = format!("{}-{}", owner_id, relative_path.replace('/', "-"));
        let target = format!("{IMAGE_DIR}/{base_name}");
        if !self.materialized.contains_key(&target) {
            let bytes = self.archive.read_member(&asset.storage_path())?;
            log::debug!("copying {} ({} bytes) to {}", asset.file_name, bytes.len(), target);
            self.materialized.insert(target, bytes);
        }
        Ok(format!("{IMAGE_REFERENCE_DIR}/{base_name}"))
    }

    fn asset_contents(&mut self, owner_id: &str) -> Result<BTreeMap<String, String>> {
        let datafiles: Vec<Asset> = self
            .assets
            .iter()
            .filter(|asset| {
                asset.item_id == owner_id && asset.file_area == DATAFILE_AREA && !asset.is_directory()
            })
            .cloned()
            .collect();

        let mut contents = BTreeMap::new();
        for asset in datafiles {
            let bytes = self.archive.read_member(&asset.storage_path())?;
            contents.insert(asset.file_name, String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(contents)
    }
}
