//! The evaluation worker.

use crate::{
    common::*,
    config::Config,
    metrics::{ClassReport, ConfusionMatrix, EvaluationReport},
};

/// Scores a trained model over a labeled dataset and writes the report.
pub fn evaluation_worker(config: Arc<Config>) -> Result<()> {
    let device = config.model.device;

    let classes = Arc::new(ClassIndexMap::load_index_file(&config.model.class_index_file)?);
    let loader = ImageLoader::new(config.dataset.image_size.get(), None)?;
    let generator = BatchGeneratorInit {
        dataset_dir: config.dataset.dir.clone(),
        classes: classes.clone(),
        batch_size: config.dataset.batch_size,
        loader,
        augmentor: None,
    }
    .build()?;

    ensure!(
        generator.num_samples() > 0,
        "no evaluation samples found in '{}'",
        config.dataset.dir.display()
    );
    info!(
        "evaluating {} samples over {} classes",
        generator.num_samples(),
        classes.num_classes()
    );

    let classifier = Classifier::load(
        &config.model.weights_file,
        classes.num_classes(),
        device,
    )?;

    let mut matrix = ConfusionMatrix::new(classes.num_classes())?;
    let mut batch_losses = vec![];
    let mut batch_accuracies = vec![];
    let mut num_seen = 0;

    for batch_index in 0..generator.num_batches() {
        let (images, labels) = generator.batch(batch_index)?;
        let batch_len = images.size4()?.0;
        if batch_len == 0 {
            warn!("skipping empty batch {}", batch_index);
            continue;
        }

        let images = images.to_device(device);
        let targets = labels.max_dim(1, false).1.to_device(device);

        let (loss, accuracy, actual, predicted) = tch::no_grad(|| {
            let logits = classifier.forward_t(&images, false);
            let loss = f64::from(&logits.cross_entropy_for_logits(&targets));
            let predictions = logits.max_dim(1, false).1;
            let accuracy = f64::from(
                &predictions
                    .eq_tensor(&targets)
                    .to_kind(Kind::Float)
                    .mean(Kind::Float),
            );
            let actual = Vec::<i64>::from(&targets.to_device(Device::Cpu));
            let predicted = Vec::<i64>::from(&predictions.to_device(Device::Cpu));
            (loss, accuracy, actual, predicted)
        });

        for (actual, predicted) in actual.into_iter().zip(predicted) {
            matrix.add(actual as usize, predicted as usize)?;
        }
        batch_losses.push(loss);
        batch_accuracies.push(accuracy);
        num_seen += batch_len as usize;
    }

    ensure!(!batch_losses.is_empty(), "every evaluation batch was empty");
    let loss = batch_losses.iter().sum::<f64>() / batch_losses.len() as f64;
    let accuracy = batch_accuracies.iter().sum::<f64>() / batch_accuracies.len() as f64;
    info!("loss: {:.5}\taccuracy: {:.5}", loss, accuracy);

    let per_class: Vec<ClassReport> = classes
        .iter()
        .enumerate()
        .map(|(index, class)| -> Result<_> {
            let metrics = matrix
                .class_metrics(index)
                .ok_or_else(|| format_err!("the class index {} is out of range", index))?;
            info!(
                "{}\tprecision: {:.4}\trecall: {:.4}\tf1: {:.4}\tsupport: {}",
                class, metrics.precision, metrics.recall, metrics.f1, metrics.support
            );
            Ok(ClassReport {
                class: class.to_owned(),
                precision: metrics.precision,
                recall: metrics.recall,
                f1: metrics.f1,
                support: metrics.support,
            })
        })
        .try_collect()?;

    let report = EvaluationReport {
        loss,
        accuracy,
        num_samples: num_seen,
        per_class,
        confusion_matrix: matrix.counts().to_vec(),
    };
    report.save(&config.output.metrics_file)?;
    info!(
        "saved the evaluation report to '{}'",
        config.output.metrics_file.display()
    );

    Ok(())
}
