//! 骨髓血细胞分析工作站主程序

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use marrow_client::{ApiClient, ClientConfig, Session};
use marrow_core::taxonomy::LeafGallery;
use marrow_core::ImageKind;
use marrow_view::{ImageAnalysisView, ReportView, SampleDirectory, UploadView};
use tracing::{error, info};

/// 工作站命令行参数
#[derive(Parser, Debug)]
#[command(name = "marrow-workstation")]
#[command(about = "骨髓血细胞智能分析工作站")]
struct Args {
    /// 后端服务地址，优先于配置文件
    #[arg(short, long)]
    server: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 医生工号，缺省时读 MARROW_DOCTOR_NUMBER
    #[arg(long)]
    doctor_number: Option<String>,

    /// 登录密码，缺省时读 MARROW_PASSWORD
    #[arg(long)]
    password: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// 工作站子命令
#[derive(Subcommand, Debug)]
enum Command {
    /// 样本列表
    Samples {
        /// 页码（从 1 开始）
        #[arg(long, default_value = "1")]
        page: u64,
        /// 每页条数
        #[arg(long, default_value = "10")]
        page_size: u64,
        /// 按样本编号过滤
        #[arg(long)]
        sample_number: Option<String>,
        /// 按患者姓名过滤
        #[arg(long)]
        patient_name: Option<String>,
        /// 按审核状态过滤
        #[arg(long)]
        status: Option<String>,
    },
    /// 查看单个样本
    Show { sample_number: String },
    /// 删除样本
    Delete { sample_number: String },
    /// 上传样本图像
    Upload {
        /// 样本编号
        #[arg(long)]
        sample_number: String,
        /// 图像文件
        files: Vec<PathBuf>,
    },
    /// 导入病人信息表格
    ImportPatients { sheet: PathBuf },
    /// 智能分析（表格 + 图像）
    Analyze {
        /// 病人信息表格
        #[arg(long)]
        sheet: Option<PathBuf>,
        /// 图像文件
        files: Vec<PathBuf>,
    },
    /// 样本的细胞分类统计
    Cells { sample_number: String },
    /// 报告分析
    Report {
        sample_number: String,
        /// 确认报告并写回结论
        #[arg(long)]
        confirm: bool,
        /// 诊断结论文本
        #[arg(long)]
        diagnosis: Option<String>,
        /// 导出 PDF 到指定路径
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    info!("启动骨髓血细胞分析工作站...");

    let config = match &args.server {
        Some(server) => ClientConfig::with_base_url(server.clone()),
        None => ClientConfig::load(args.config.as_deref())?,
    };
    info!("后端服务地址: {}", config.base_url);

    let session = Arc::new(Session::new());
    session
        .on_unauthorized(|| error!("登录状态失效，请重新登录"))
        .await;
    let client = Arc::new(ApiClient::new(config, session)?);

    let doctor_number = args
        .doctor_number
        .clone()
        .or_else(|| std::env::var("MARROW_DOCTOR_NUMBER").ok())
        .ok_or_else(|| anyhow::anyhow!("缺少医生工号：--doctor-number 或 MARROW_DOCTOR_NUMBER"))?;
    let password = args
        .password
        .clone()
        .or_else(|| std::env::var("MARROW_PASSWORD").ok())
        .ok_or_else(|| anyhow::anyhow!("缺少密码：--password 或 MARROW_PASSWORD"))?;

    let login = client.login(&doctor_number, &password).await?;
    if let Some(user) = &login.user {
        info!("当前用户: {} ({})", user.name, user.role);
    }

    match args.command {
        Command::Samples {
            page,
            page_size,
            sample_number,
            patient_name,
            status,
        } => {
            run_samples(client, page, page_size, sample_number, patient_name, status).await?;
        }
        Command::Show { sample_number } => run_show(client, &sample_number).await?,
        Command::Delete { sample_number } => run_delete(client, &sample_number).await?,
        Command::Upload {
            sample_number,
            files,
        } => run_upload(client, sample_number, files).await?,
        Command::ImportPatients { sheet } => run_import(client, sheet).await?,
        Command::Analyze { sheet, files } => run_analyze(client, sheet, files).await?,
        Command::Cells { sample_number } => run_cells(client, &sample_number).await?,
        Command::Report {
            sample_number,
            confirm,
            diagnosis,
            export,
        } => run_report(client, &sample_number, confirm, diagnosis, export).await?,
    }

    Ok(())
}

async fn run_samples(
    client: Arc<ApiClient>,
    page: u64,
    page_size: u64,
    sample_number: Option<String>,
    patient_name: Option<String>,
    status: Option<String>,
) -> anyhow::Result<()> {
    let mut directory = SampleDirectory::new(client);
    directory.form.sample_number = sample_number.unwrap_or_default();
    directory.form.patient_name = patient_name.unwrap_or_default();
    directory.form.review_status = status.unwrap_or_default();
    directory.set_page_size(page_size);
    directory.page = page;
    directory.reload().await?;

    println!(
        "{:<18} {:<8} {:<10} {:<6} {:<10}",
        "样本编号", "类型", "患者姓名", "年龄", "状态"
    );
    for row in &directory.rows {
        println!(
            "{:<18} {:<8} {:<10} {:<6} {:<10}",
            row.sample_number,
            row.sample_type,
            row.patient_name,
            row.patient_age
                .map(|age| format!("{}岁", age))
                .unwrap_or_else(|| "-".to_string()),
            row.status.as_label(),
        );
    }
    println!(
        "共 {} 项数据，第 {}/{} 页",
        directory.total,
        directory.page,
        directory.total_pages()
    );
    Ok(())
}

async fn run_show(client: Arc<ApiClient>, sample_number: &str) -> anyhow::Result<()> {
    let smear = client.get_smear(sample_number).await?;
    println!("样本编号: {}", smear.sample_number);
    println!("类型:     {}", smear.sample_type.as_deref().unwrap_or("血涂本"));
    println!("状态:     {}", smear.review_status().as_label());
    println!("扫描方式: {}", smear.scanner.as_deref().unwrap_or("-"));
    if let Some(patient) = &smear.patient {
        println!(
            "患者:     {} ({}, {})",
            patient.name,
            patient.gender.as_deref().unwrap_or("-"),
            patient
                .age
                .map(|age| format!("{}岁", age))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    if let Some(doctor) = &smear.inspection_doctor {
        println!("送检医生: {}", doctor.name);
    }
    Ok(())
}

async fn run_delete(client: Arc<ApiClient>, sample_number: &str) -> anyhow::Result<()> {
    let mut directory = SampleDirectory::new(client);
    directory.delete(sample_number).await?;
    println!("样本 {} 已删除", sample_number);
    Ok(())
}

async fn run_upload(
    client: Arc<ApiClient>,
    sample_number: String,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let mut view = UploadView::new(client);
    view.sample_number = sample_number;
    view.select_images(files);
    let report = view.upload_images().await?;
    println!(
        "上传完成: 成功 {} 个，失败 {} 个",
        report.success_count, report.error_count
    );
    for item in &report.results {
        if !item.success {
            println!(
                "  {} 失败: {}",
                item.filename,
                item.message.as_deref().unwrap_or("未知原因")
            );
        }
    }
    Ok(())
}

async fn run_import(client: Arc<ApiClient>, sheet: PathBuf) -> anyhow::Result<()> {
    let mut view = UploadView::new(client);
    view.select_sheet(sheet);
    let report = view.import_patients().await?;
    println!(
        "导入完成: 新建 {} 条，更新 {} 条，错误 {} 条",
        report.created_count, report.updated_count, report.error_count
    );
    for message in &report.errors {
        println!("  错误: {}", message);
    }
    Ok(())
}

async fn run_analyze(
    client: Arc<ApiClient>,
    sheet: Option<PathBuf>,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let mut view = UploadView::new(client);
    if let Some(sheet) = sheet {
        view.select_sheet(sheet);
    }
    view.select_images(files);

    println!("分析中...");
    match view.run_analysis().await {
        Ok(report) => {
            println!("分析完成！共分析 {} 张图片", report.total_images);
            Ok(())
        }
        Err(err) => {
            error!("analysis failed: {}", err);
            Err(err.into())
        }
    }
}

async fn run_cells(client: Arc<ApiClient>, sample_number: &str) -> anyhow::Result<()> {
    let mut view = ImageAnalysisView::new(client);
    view.load_sample(sample_number).await;
    if let Some(message) = &view.error {
        println!("加载细胞分类失败: {}", message);
        return Ok(());
    }

    for branch in &view.summary.branches {
        println!("{} {}", branch.name, branch.count);
        for leaf in &branch.leaves {
            if leaf.count > 0 {
                println!("  {} {}", leaf.name, leaf.count);
                match view.gallery(leaf.name) {
                    LeafGallery::Images { cells, truncated } => {
                        if truncated > 0 {
                            println!("    展示 {} 张，截断 {} 张", cells.len(), truncated);
                        }
                    }
                    LeafGallery::Empty => println!("    暂无图像"),
                }
            }
        }
    }
    if view.summary.unmatched > 0 {
        println!("未命中分类树的细胞: {}", view.summary.unmatched);
    }
    println!("样本图像: {} 张", view.images.len());
    for kind in [ImageKind::Region, ImageKind::Cell, ImageKind::Marked] {
        let group = view.images_of_kind(kind);
        if !group.is_empty() {
            println!("  {}: {} 张", kind.as_label(), group.len());
        }
    }
    if view.filter_bypassed {
        println!("警告: 图像路径均不含样本编号，已跳过过滤");
    }
    Ok(())
}

async fn run_report(
    client: Arc<ApiClient>,
    sample_number: &str,
    confirm: bool,
    diagnosis: Option<String>,
    export: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut view = ReportView::new(client);
    view.load_sample(sample_number).await?;
    if let Some(diagnosis) = diagnosis {
        view.diagnosis = diagnosis;
    }

    println!("细胞总数: {}", view.total_cells);
    for section in view.sections() {
        println!("== {} ==", section.title);
        for row in &section.rows {
            println!(
                "  {:<24} {:>6} {:>8.1}% {:>10} {}",
                row.name,
                row.count,
                row.percent,
                row.reference,
                row.indicator.map(|i| i.as_label()).unwrap_or(""),
            );
        }
    }

    if confirm {
        let checklist = view.confirm().await?;
        println!(
            "报告已确认: {} ({})",
            checklist.checklist_number,
            checklist.report_date.as_deref().unwrap_or("-")
        );
    }
    if let Some(path) = export {
        view.export(&path).await?;
        println!("报告已导出到 {}", path.display());
    }
    Ok(())
}
