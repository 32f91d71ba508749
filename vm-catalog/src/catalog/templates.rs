use super::{
    document_exists, document_names, fetch_all_documents, fetch_document, Catalog, NETWORKS,
    STORAGEPOOLS, TEMPLATES,
};
use crate::error::{CatalogError, Result};
use crate::media::{icon_for, MediaKind, UNKNOWN_OS};
use crate::messages;
use crate::reason;
use crate::refs;
use crate::storagepool::{PoolType, StoragePool, DEFAULT_POOL};
use crate::template::merge::{dedup_networks, merge_update};
use crate::template::validate::{is_remote_media, validate_name, validate_template};
use crate::template::{
    decode_pool_ref, pool_name_from_ref, pool_uri, CpuInfo, CreateTemplateRequest, Disk, DiskFormat, DiskRequest,
    Graphics, Memory, PoolRef, Template, TemplateInfo, UpdateOutcome, UpdateTemplateRequest,
    DEFAULT_DISK_SIZE_GIB,
};
use crate::network::DEFAULT_NETWORK;
use chrono::Utc;
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

/// Where a new template boots from
enum Source {
    Netboot,
    Media { path: String, iso_only: bool },
    DisksOnly,
}

fn not_found(name: &str) -> CatalogError {
    CatalogError::NotFound(reason!(messages::TEMPLATE_NOT_FOUND, name = name))
}

fn already_exists(name: &str) -> CatalogError {
    CatalogError::InvalidParameter(reason!(messages::TEMPLATE_EXISTS, name = name))
}

fn invalid_cdrom(path: &str) -> CatalogError {
    CatalogError::InvalidParameter(reason!(messages::TEMPLATE_INVALID_CDROM, param = path))
}

impl Catalog {
    #[instrument(skip(self))]
    pub async fn list_templates(&self) -> Result<Vec<TemplateInfo>> {
        let mut conn = self.pool.acquire().await?;
        let templates: Vec<Template> = fetch_all_documents(&mut conn, TEMPLATES).await?;
        let networks = document_names(&mut conn, NETWORKS).await?;
        let pools = document_names(&mut conn, STORAGEPOOLS).await?;
        drop(conn);

        let missing = self.missing_media(&templates).await?;
        Ok(templates
            .into_iter()
            .map(|template| describe(template, &networks, &pools, &missing))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_template(&self, name: &str) -> Result<TemplateInfo> {
        let mut conn = self.pool.acquire().await?;
        let (template, _) = fetch_document::<Template>(&mut conn, TEMPLATES, name)
            .await?
            .ok_or_else(|| not_found(name))?;
        let networks = document_names(&mut conn, NETWORKS).await?;
        let pools = document_names(&mut conn, STORAGEPOOLS).await?;
        drop(conn);

        let missing = self.missing_media(std::slice::from_ref(&template)).await?;
        Ok(describe(template, &networks, &pools, &missing))
    }

    /// Create a template from a request, applying defaults and media detection
    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create_template(&self, req: CreateTemplateRequest) -> Result<TemplateInfo> {
        validate_name("template", &req.name)?;
        let source = Self::resolve_source(&req)?;

        // Re-checked inside the write transaction
        {
            let mut conn = self.pool.acquire().await?;
            if document_exists(&mut conn, TEMPLATES, &req.name).await? {
                return Err(already_exists(&req.name));
            }
        }

        let media = match &source {
            Source::Media { path, iso_only } => {
                let kind = self.inspect_media(path).await?;
                if *iso_only && matches!(kind, MediaKind::Image { .. }) {
                    return Err(invalid_cdrom(path));
                }
                Some((path.clone(), kind))
            }
            Source::Netboot | Source::DisksOnly => None,
        };

        let mut cdrom = None;
        let mut detected = (None, None);
        let mut base_image = None;
        match media {
            Some((path, MediaKind::Iso { distro, version })) => {
                cdrom = Some(path);
                detected = (distro, version);
            }
            Some((path, MediaKind::Image { format, size_gib })) => {
                base_image = Some((path, format, size_gib));
            }
            None => {}
        }

        let os_distro = req
            .os_distro
            .clone()
            .or(detected.0)
            .unwrap_or_else(|| UNKNOWN_OS.to_string());
        let os_version = req
            .os_version
            .clone()
            .or(detected.1)
            .unwrap_or_else(|| UNKNOWN_OS.to_string());
        let icon = req.icon.clone().unwrap_or_else(|| icon_for(&os_distro));

        let mut memory = Memory::default();
        if let Some(patch) = &req.memory {
            patch.merge_into(&mut memory);
            if patch.maxmemory.is_none() {
                memory.maxmemory = memory.maxmemory.max(memory.current);
            }
        }

        let mut cpu_info = CpuInfo::default();
        if let Some(patch) = &req.cpu_info {
            patch.merge_into(&mut cpu_info);
            if patch.maxvcpus.is_none() {
                cpu_info.maxvcpus = cpu_info.maxvcpus.max(cpu_info.vcpus);
            }
        }

        let mut graphics = Graphics::default();
        if let Some(patch) = &req.graphics {
            patch.merge_into(&mut graphics)?;
        }

        let networks = match &req.networks {
            Some(networks) => dedup_networks(networks),
            None => vec![DEFAULT_NETWORK.to_string()],
        };

        let disk_requests = req.disks.clone().unwrap_or_else(|| {
            vec![DiskRequest {
                size: Some(DEFAULT_DISK_SIZE_GIB),
                ..Default::default()
            }]
        });

        let mut tx = self.pool.begin().await?;
        if document_exists(&mut tx, TEMPLATES, &req.name).await? {
            return Err(already_exists(&req.name));
        }

        let mut disks = normalize_disks(&mut tx, &req.name, &disk_requests).await?;
        if let Some((path, format, size_gib)) = base_image {
            if let Some(first) = disks.first_mut() {
                if first.pool.kind.is_readonly() {
                    return Err(CatalogError::InvalidParameter(reason!(
                        messages::TEMPLATE_BASE_ON_READONLY_POOL,
                        path = &path,
                        index = first.index,
                        pool = pool_name_from_ref(&first.pool.name)
                    )));
                }
                first.base = Some(path);
                first.format = format;
                first.size = Some(first.size.unwrap_or(0).max(size_gib));
            }
        }

        let template = Template {
            name: req.name.clone(),
            os_distro,
            os_version,
            icon,
            memory,
            cpu_info,
            cdrom,
            disks,
            networks,
            graphics,
            folder: req.folder.clone().unwrap_or_default(),
        };

        validate_template(&template, self.host())?;
        check_networks(&mut tx, &template).await?;

        let now = Utc::now().timestamp();
        write_template(&mut tx, &template, now).await?;
        refs::index_template(&mut tx, &template).await?;
        tx.commit().await?;

        info!(template = %template.name, "Template created");
        self.get_template(&template.name).await
    }

    /// Merge a partial update into a stored template, possibly renaming it
    #[instrument(skip(self, update))]
    pub async fn update_template(
        &self,
        name: &str,
        update: UpdateTemplateRequest,
    ) -> Result<UpdateOutcome> {
        let mut tx = self.pool.begin().await?;
        let (current, created_at) = fetch_document::<Template>(&mut tx, TEMPLATES, name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let renamed = update.name.as_deref().filter(|new_name| *new_name != name);
        if let Some(new_name) = renamed {
            validate_name("template", new_name)?;
            if document_exists(&mut tx, TEMPLATES, new_name).await? {
                return Err(already_exists(new_name));
            }
        }

        if let Some(Some(cdrom)) = &update.cdrom {
            if !is_remote_media(cdrom) && !(cdrom.starts_with('/') && self.media_exists(cdrom).await?)
            {
                return Err(invalid_cdrom(cdrom));
            }
        }

        let target = renamed.unwrap_or(name);
        let disks = match &update.disks {
            Some(requests) => Some(normalize_disks(&mut tx, target, requests).await?),
            None => None,
        };

        let merged = merge_update(&current, &update, disks)?;
        validate_template(&merged, self.host())?;
        if update.networks.is_some() {
            check_networks(&mut tx, &merged).await?;
        }

        if renamed.is_some() {
            super::delete_document(&mut tx, TEMPLATES, name).await?;
            refs::unindex_template(&mut tx, name).await?;
        }
        write_template(&mut tx, &merged, created_at).await?;
        refs::index_template(&mut tx, &merged).await?;
        tx.commit().await?;

        if let Some(new_name) = renamed {
            info!(from = %name, to = %new_name, "Template renamed");
        } else {
            info!(template = %name, "Template updated");
        }

        Ok(UpdateOutcome {
            template: self.get_template(&merged.name).await?,
            renamed_from: renamed.map(|_| name.to_string()),
        })
    }

    /// Copy a template to the first free `{name}-clone{N}`
    #[instrument(skip(self))]
    pub async fn clone_template(&self, name: &str) -> Result<TemplateInfo> {
        let mut tx = self.pool.begin().await?;
        let (mut template, _) = fetch_document::<Template>(&mut tx, TEMPLATES, name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let mut suffix = 1u32;
        let clone_name = loop {
            let candidate = format!("{}-clone{}", name, suffix);
            if !document_exists(&mut tx, TEMPLATES, &candidate).await? {
                break candidate;
            }
            suffix += 1;
        };

        template.name = clone_name;
        write_template(&mut tx, &template, Utc::now().timestamp()).await?;
        refs::index_template(&mut tx, &template).await?;
        tx.commit().await?;

        info!(source = %name, clone = %template.name, "Template cloned");
        self.get_template(&template.name).await
    }

    #[instrument(skip(self))]
    pub async fn delete_template(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM templates WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(name));
        }
        refs::unindex_template(&mut tx, name).await?;
        tx.commit().await?;

        info!(template = %name, "Template deleted");
        Ok(())
    }

    fn resolve_source(req: &CreateTemplateRequest) -> Result<Source> {
        if let Some(media) = &req.source_media {
            return match media.kind.as_str() {
                "netboot" => Ok(Source::Netboot),
                "disk" => match media.path.as_deref().filter(|p| !p.trim().is_empty()) {
                    Some(path) => Ok(Source::Media {
                        path: path.to_string(),
                        iso_only: false,
                    }),
                    None => Err(CatalogError::InvalidParameter(reason!(
                        messages::TEMPLATE_MISSING_SOURCE
                    ))),
                },
                other => Err(CatalogError::InvalidParameter(reason!(
                    messages::TEMPLATE_INVALID_SOURCE_TYPE,
                    kind = other
                ))),
            };
        }

        if let Some(cdrom) = &req.cdrom {
            return Ok(Source::Media {
                path: cdrom.clone(),
                iso_only: true,
            });
        }

        match &req.disks {
            Some(disks) if !disks.is_empty() => Ok(Source::DisksOnly),
            _ => Err(CatalogError::InvalidParameter(reason!(
                messages::TEMPLATE_MISSING_SOURCE
            ))),
        }
    }

    async fn inspect_media(&self, path: &str) -> Result<MediaKind> {
        if is_remote_media(path) {
            return Ok(MediaKind::Iso {
                distro: None,
                version: None,
            });
        }

        let media = Arc::clone(&self.media);
        let path = path.to_string();
        tokio::task::spawn_blocking(move || media.inspect(&path)).await?
    }

    async fn media_exists(&self, path: &str) -> Result<bool> {
        let media = Arc::clone(&self.media);
        let path = path.to_string();
        Ok(tokio::task::spawn_blocking(move || media.exists(&path)).await?)
    }

    /// Local CDROMs and base images of `templates` that are no longer present
    async fn missing_media(&self, templates: &[Template]) -> Result<HashSet<String>> {
        let paths: Vec<String> = templates
            .iter()
            .flat_map(|template| {
                template
                    .cdrom
                    .iter()
                    .chain(template.disks.iter().filter_map(|disk| disk.base.as_ref()))
            })
            .filter(|path| !is_remote_media(path))
            .cloned()
            .collect();
        if paths.is_empty() {
            return Ok(HashSet::new());
        }

        let media = Arc::clone(&self.media);
        let missing: HashSet<String> = tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .filter(|path| !media.exists(path))
                .collect()
        })
        .await?;
        Ok(missing)
    }
}

/// Attach the integrity report: references that no longer resolve
fn describe(
    template: Template,
    networks: &HashSet<String>,
    pools: &HashSet<String>,
    missing_media: &HashSet<String>,
) -> TemplateInfo {
    let mut invalid = BTreeMap::new();

    if let Some(cdrom) = &template.cdrom {
        if missing_media.contains(cdrom) {
            invalid.insert("cdrom".to_string(), vec![cdrom.clone()]);
        }
    }

    let missing_networks: Vec<String> = template
        .referenced_networks()
        .into_iter()
        .filter(|name| !networks.contains(*name))
        .map(str::to_string)
        .collect();
    if !missing_networks.is_empty() {
        invalid.insert("networks".to_string(), missing_networks);
    }

    let missing_pools: Vec<String> = template
        .referenced_pools()
        .into_iter()
        .filter(|name| !pools.contains(*name))
        .map(str::to_string)
        .collect();
    if !missing_pools.is_empty() {
        invalid.insert("storagepools".to_string(), missing_pools);
    }

    let missing_bases: Vec<String> = template
        .disks
        .iter()
        .filter_map(|disk| disk.base.as_ref())
        .filter(|base| missing_media.contains(*base))
        .cloned()
        .collect();
    if !missing_bases.is_empty() {
        invalid.insert("disks".to_string(), missing_bases);
    }

    TemplateInfo { template, invalid }
}

/// Resolve each disk's pool and fill in index, format and size
async fn normalize_disks(
    conn: &mut SqliteConnection,
    template: &str,
    requests: &[DiskRequest],
) -> Result<Vec<Disk>> {
    let mut disks = Vec::with_capacity(requests.len());

    for (position, req) in requests.iter().enumerate() {
        let pool_name = req
            .pool
            .as_ref()
            .map(|pool| decode_pool_ref(&pool.name))
            .unwrap_or_else(|| DEFAULT_POOL.to_string());
        let pool_name = pool_name.as_str();
        let (pool, _) = fetch_document::<StoragePool>(conn, STORAGEPOOLS, pool_name)
            .await?
            .ok_or_else(|| {
                CatalogError::InvalidParameter(reason!(
                    messages::TEMPLATE_POOL_MISSING,
                    pool = pool_name,
                    template = template
                ))
            })?;
        if !pool.state.is_active() {
            return Err(CatalogError::InvalidParameter(reason!(
                messages::TEMPLATE_POOL_INACTIVE,
                pool = pool_name,
                template = template
            )));
        }

        let index = req.index.unwrap_or(position as u32);
        let format = match req.format.as_deref() {
            Some(format) => format.parse::<DiskFormat>()?,
            None if pool.kind == PoolType::Logical => DiskFormat::Raw,
            None => DiskFormat::Qcow2,
        };

        let (size, volume) = if pool.kind.is_readonly() {
            match req.volume.as_deref() {
                Some(volume) if pool.volumes.iter().any(|v| v == volume) => {
                    (None, Some(volume.to_string()))
                }
                other => {
                    return Err(CatalogError::InvalidParameter(reason!(
                        messages::TEMPLATE_VOLUME_MISSING,
                        index = index,
                        pool = pool_name,
                        volume = other.unwrap_or_default()
                    )))
                }
            }
        } else {
            let size = req.size.unwrap_or(DEFAULT_DISK_SIZE_GIB);
            if size == 0 {
                return Err(CatalogError::InvalidParameter(reason!(
                    messages::TEMPLATE_INVALID_DISK_SIZE,
                    index = index,
                    pool = pool_name
                )));
            }
            (Some(size), None)
        };

        disks.push(Disk {
            index,
            size,
            format,
            pool: PoolRef {
                name: pool_uri(pool_name),
                kind: pool.kind,
            },
            volume,
            base: None,
        });
    }

    Ok(disks)
}

async fn check_networks(conn: &mut SqliteConnection, template: &Template) -> Result<()> {
    for network in template.referenced_networks() {
        if !document_exists(conn, NETWORKS, network).await? {
            return Err(CatalogError::InvalidParameter(reason!(
                messages::TEMPLATE_NETWORK_MISSING,
                network = network,
                template = &template.name
            )));
        }
    }
    Ok(())
}

async fn write_template(
    conn: &mut SqliteConnection,
    template: &Template,
    created_at: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO templates (name, body, created_at, updated_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
    )
    .bind(&template.name)
    .bind(serde_json::to_string(template)?)
    .bind(created_at)
    .bind(Utc::now().timestamp())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
